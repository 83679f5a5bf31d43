//! Shared HTTP plumbing: response envelope, error mapping, validation

pub mod response;
pub mod validated_json;

pub use response::{ApiError, ApiResponse};
pub use validated_json::ValidatedJson;
