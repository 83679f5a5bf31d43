//! SeaORM implementation of RepositoryProvider

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::domain::otp::OtpAuditRepository;
use crate::domain::pairing::{PairedDeviceRepository, PairingStore};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::station::StationRepository;
use crate::domain::user::UserRepository;
use crate::domain::vehicle::VehicleRepository;
use crate::infrastructure::database::advisory::LockRegistry;

use super::otp_audit_repository::SeaOrmOtpAuditRepository;
use super::paired_device_repository::SeaOrmPairedDeviceRepository;
use super::pairing_store::SeaOrmPairingStore;
use super::station_repository::SeaOrmStationRepository;
use super::user_repository::SeaOrmUserRepository;
use super::vehicle_repository::SeaOrmVehicleRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository
/// accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let user = repos.users().find_by_phone("+919876543210").await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    users: SeaOrmUserRepository,
    vehicles: SeaOrmVehicleRepository,
    stations: SeaOrmStationRepository,
    paired_devices: SeaOrmPairedDeviceRepository,
    pairing: SeaOrmPairingStore,
    otp_audit: SeaOrmOtpAuditRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        let locks = Arc::new(LockRegistry::new());
        Self {
            users: SeaOrmUserRepository::new(db.clone()),
            vehicles: SeaOrmVehicleRepository::new(db.clone()),
            stations: SeaOrmStationRepository::new(db.clone()),
            paired_devices: SeaOrmPairedDeviceRepository::new(db.clone()),
            pairing: SeaOrmPairingStore::new(db.clone(), locks),
            otp_audit: SeaOrmOtpAuditRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn users(&self) -> &dyn UserRepository {
        &self.users
    }

    fn vehicles(&self) -> &dyn VehicleRepository {
        &self.vehicles
    }

    fn stations(&self) -> &dyn StationRepository {
        &self.stations
    }

    fn paired_devices(&self) -> &dyn PairedDeviceRepository {
        &self.paired_devices
    }

    fn pairing(&self) -> &dyn PairingStore {
        &self.pairing
    }

    fn otp_audit(&self) -> &dyn OtpAuditRepository {
        &self.otp_audit
    }
}
