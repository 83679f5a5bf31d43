//! Repository provider
//!
//! One object owning the relational connection pool and exposing
//! per-aggregate repository accessors. Services depend on this trait, not
//! on concrete stores.

use crate::domain::otp::OtpAuditRepository;
use crate::domain::pairing::{PairedDeviceRepository, PairingStore};
use crate::domain::station::StationRepository;
use crate::domain::user::UserRepository;
use crate::domain::vehicle::VehicleRepository;

pub trait RepositoryProvider: Send + Sync {
    fn users(&self) -> &dyn UserRepository;
    fn vehicles(&self) -> &dyn VehicleRepository;
    fn stations(&self) -> &dyn StationRepository;
    fn paired_devices(&self) -> &dyn PairedDeviceRepository;
    fn pairing(&self) -> &dyn PairingStore;
    fn otp_audit(&self) -> &dyn OtpAuditRepository;
}
