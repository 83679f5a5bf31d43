//! Database entities (SeaORM models)

pub mod otp_audit;
pub mod paired_device;
pub mod station;
pub mod user;
pub mod vehicle;
