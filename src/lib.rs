//! # Voltra Backend Core
//!
//! Operational core of the Voltra EV charging platform: phone-OTP
//! authentication, range-aware charging-station discovery, and the
//! vehicle↔device pairing registry.
//!
//! ## Architecture (Clean / SOLID)
//!
//! - **shared**: Cross-cutting utilities (errors, shutdown, phone
//!   canonicalization, cursor pagination)
//! - **domain**: Core business entities, repository traits, and the pure
//!   range/strategy calculator
//! - **application**: Use-case orchestration (OTP lifecycle, sessions,
//!   rate limits, bloom filter, SMS queue, discovery, pairing, listings)
//! - **infrastructure**: External concerns (relational store, KV store,
//!   crypto, SMS providers)
//! - **interfaces**: Delivery mechanisms (HTTP REST)
//! - **config**: Environment-driven application configuration

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

// Re-export commonly used types at crate root
pub use config::AppConfig;
pub use infrastructure::database::migrator::Migrator;
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use interfaces::http::{create_api_router, AppState};
