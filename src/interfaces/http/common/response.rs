//! API response envelope and error mapping

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{DomainError, ErrorCode};
use crate::shared::types::errors::AppError;

/// Standard response wrapper.
///
/// Success: `{"success":true,"message":…,"data":…,"timestamp":…}`.
/// Error: `{"success":false,"message":…,"error":<CODE>,"details":…,"timestamp":…}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            details: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(code.as_str()),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Domain error as an HTTP response. Handlers bubble `DomainError` with
/// `?`; the conversion picks status, code, and details in one place.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(domain) => Self(domain),
            AppError::Infra(infra) => Self(DomainError::Internal(infra.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Store internals never reach clients.
        let message = match &self.0 {
            DomainError::StoreUnavailable(_) | DomainError::Internal(_) => {
                tracing::error!(error = %self.0, "Internal error surfaced to client");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = ApiResponse::error(message, code);
        match &self.0 {
            DomainError::InvalidOtp { remaining_attempts } => {
                body = body
                    .with_details(serde_json::json!({ "remainingAttempts": remaining_attempts }));
            }
            DomainError::RateLimited {
                retry_after_seconds,
                ..
            } => {
                body = body.with_details(serde_json::json!({ "retryAfter": retry_after_seconds }));
            }
            _ => {}
        }

        let retry_after = self.0.retry_after();
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
