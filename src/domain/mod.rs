//! Domain layer - core business entities and types

pub mod otp;
pub mod pairing;
pub mod repositories;
pub mod station;
pub mod user;
pub mod vehicle;

pub use crate::shared::types::errors::{DomainError, DomainResult, ErrorCode};
pub use otp::{AuditEventType, OtpAuditEntry, OtpRecord, RefreshRecord, Session, TokenPair};
pub use pairing::{
    LatestVehicleStatus, ListSort, PairedDevice, PairedDeviceQuery, PairingCommand, PairingOutcome,
};
pub use repositories::RepositoryProvider;
pub use station::{haversine_km, is_along_route, Coordinates, Plug, Station};
pub use user::{User, UserSummary};
pub use vehicle::{
    canonical_reg_number, charging_strategy, estimate_range, ChargingStrategy, ChargingUrgency,
    RangeEstimate, Vehicle, VehicleStatic, ZoneBoundaries,
};
