//! HTTP REST API interfaces
//!
//! - `middleware`: bearer authentication
//! - `common`: response envelope, error mapping, validated JSON
//! - `modules`: per-resource handlers and DTOs
//! - `router`: API router assembly

pub mod common;
pub mod middleware;
pub mod modules;
pub mod router;

pub use router::{create_api_router, AppState};
