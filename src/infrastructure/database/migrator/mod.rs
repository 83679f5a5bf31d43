//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users;
mod m20250301_000002_create_vehicles;
mod m20250301_000003_create_paired_devices;
mod m20250301_000004_create_stations;
mod m20250301_000005_create_otp_audits;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users::Migration),
            Box::new(m20250301_000002_create_vehicles::Migration),
            Box::new(m20250301_000003_create_paired_devices::Migration),
            Box::new(m20250301_000004_create_stations::Migration),
            Box::new(m20250301_000005_create_otp_audits::Migration),
        ]
    }
}
