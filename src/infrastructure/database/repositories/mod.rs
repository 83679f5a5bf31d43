//! SeaORM repository implementations

pub mod otp_audit_repository;
pub mod paired_device_repository;
pub mod pairing_store;
pub mod repository_provider;
pub mod station_repository;
pub mod user_repository;
pub mod vehicle_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use crate::domain::DomainError;

/// Map a SeaORM error to the domain taxonomy. Unique and FK violations get
/// their own codes; everything else is internal.
pub(crate) fn db_err(e: sea_orm::DbErr) -> DomainError {
    let text = e.to_string();
    if text.contains("UNIQUE") || text.contains("duplicate") {
        DomainError::Conflict("Unique constraint violated".to_string())
    } else if text.contains("FOREIGN KEY") || text.contains("foreign key") {
        DomainError::InvalidReference("Referenced row does not exist".to_string())
    } else {
        DomainError::Internal(format!("Database error: {}", e))
    }
}
