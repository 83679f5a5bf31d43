//! Pairing aggregate
//!
//! Vehicle ↔ device pairing records and the transactional pairing seam.

pub mod model;
pub mod repository;

pub use model::{LatestVehicleStatus, PairedDevice, PairingCommand, PairingOutcome};
pub use repository::{ListSort, PairedDeviceQuery, PairedDeviceRepository, PairingStore};
