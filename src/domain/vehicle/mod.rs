//! Vehicle aggregate
//!
//! The vehicle entity, the range/strategy calculator, and the repository
//! interface.

pub mod model;
pub mod range;
pub mod repository;

pub use model::{canonical_reg_number, Vehicle, VehicleStatic};
pub use range::{
    charging_strategy, estimate_range, ChargingStrategy, ChargingUrgency, RangeEstimate,
    ZoneBoundaries,
};
pub use repository::VehicleRepository;
