//! Metrics exposition endpoint

pub mod handlers;

pub use handlers::MetricsHandlerState;
