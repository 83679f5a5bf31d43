//! Infrastructure layer - external concerns

pub mod crypto;
pub mod database;
pub mod kv;
pub mod sms;

pub use database::{init_database, DatabaseConfig, LockRegistry, SeaOrmRepositoryProvider};
pub use kv::{KvStore, MemoryKv};
pub use sms::{ConsoleSmsProvider, RetryingSmsProvider, SmsProvider};
