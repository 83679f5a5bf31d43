//! Probabilistic phone-existence filter

pub mod filter;
pub mod service;

pub use filter::{BloomConfidence, BloomFilter};
pub use service::{BloomCheck, BloomConfig, PhoneExistenceFilter};
