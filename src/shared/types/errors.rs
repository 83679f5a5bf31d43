use thiserror::Error;

/// Stable error codes surfaced to API clients.
///
/// Codes are part of the public contract; renaming one is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Input
    ValidationError,
    InvalidPhone,
    InvalidCursor,
    // Auth
    Unauthorized,
    InvalidRefreshToken,
    RefreshTokenExpired,
    RefreshTokenRevoked,
    InvalidTokenType,
    RefreshTokenRequired,
    TokenRevoked,
    UserNotFound,
    // OTP
    OtpNotFound,
    OtpExpired,
    InvalidOtp,
    PhoneNotRegistered,
    AccountLocked,
    // Rate
    RateLimitExceeded,
    PhoneRateLimitExceeded,
    // Resource
    VehicleNotFound,
    Conflict,
    ResourceLocked,
    InvalidReference,
    // System
    InternalError,
    ServiceUnhealthy,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidPhone => "INVALID_PHONE",
            Self::InvalidCursor => "INVALID_CURSOR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::RefreshTokenExpired => "REFRESH_TOKEN_EXPIRED",
            Self::RefreshTokenRevoked => "REFRESH_TOKEN_REVOKED",
            Self::InvalidTokenType => "INVALID_TOKEN_TYPE",
            Self::RefreshTokenRequired => "REFRESH_TOKEN_REQUIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::OtpNotFound => "OTP_NOT_FOUND",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::InvalidOtp => "INVALID_OTP",
            Self::PhoneNotRegistered => "PHONE_NOT_REGISTERED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::PhoneRateLimitExceeded => "PHONE_RATE_LIMIT_EXCEEDED",
            Self::VehicleNotFound => "VEHICLE_NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::ResourceLocked => "RESOURCE_LOCKED",
            Self::InvalidReference => "INVALID_REFERENCE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ServiceUnhealthy => "SERVICE_UNHEALTHY",
        }
    }

    /// HTTP status the code maps to at the API boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationError
            | Self::InvalidPhone
            | Self::InvalidCursor
            | Self::OtpNotFound
            | Self::OtpExpired
            | Self::InvalidOtp
            | Self::PhoneNotRegistered
            | Self::InvalidReference => 400,
            Self::Unauthorized
            | Self::InvalidRefreshToken
            | Self::RefreshTokenExpired
            | Self::RefreshTokenRevoked
            | Self::InvalidTokenType
            | Self::RefreshTokenRequired
            | Self::TokenRevoked
            | Self::UserNotFound => 401,
            Self::VehicleNotFound => 404,
            Self::Conflict => 409,
            Self::AccountLocked | Self::RateLimitExceeded | Self::PhoneRateLimitExceeded => 429,
            Self::InternalError => 500,
            Self::ResourceLocked | Self::ServiceUnhealthy => 503,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{message}")]
    Invalid { code: ErrorCode, message: String },

    #[error("{message}")]
    Unauthorized { code: ErrorCode, message: String },

    #[error("{message}")]
    RateLimited {
        code: ErrorCode,
        message: String,
        retry_after_seconds: u64,
    },

    #[error("Invalid OTP")]
    InvalidOtp { remaining_attempts: u32 },

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
        code: ErrorCode,
    },

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Resource is locked: {0}")]
    ResourceLocked(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Invalid {
            code: ErrorCode::ValidationError,
            message: message.into(),
        }
    }

    pub fn invalid_phone(message: impl Into<String>) -> Self {
        Self::Invalid {
            code: ErrorCode::InvalidPhone,
            message: message.into(),
        }
    }

    pub fn invalid_cursor() -> Self {
        Self::Invalid {
            code: ErrorCode::InvalidCursor,
            message: "Malformed pagination cursor".to_string(),
        }
    }

    pub fn otp(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn rate_limited(
        code: ErrorCode,
        message: impl Into<String>,
        retry_after_seconds: u64,
    ) -> Self {
        Self::RateLimited {
            code,
            message: message.into(),
            retry_after_seconds,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid { code, .. }
            | Self::Unauthorized { code, .. }
            | Self::RateLimited { code, .. }
            | Self::NotFound { code, .. } => *code,
            Self::InvalidOtp { .. } => ErrorCode::InvalidOtp,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::ResourceLocked(_) => ErrorCode::ResourceLocked,
            Self::InvalidReference(_) => ErrorCode::InvalidReference,
            Self::StoreUnavailable(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Seconds the client should wait before retrying, for 429-class errors.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("KV store error: {0}")]
    Kv(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SMS provider error: {0}")]
    Sms(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Domain(e) => e.code(),
            Self::Infra(_) => ErrorCode::InternalError,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Domain(e) => e.retry_after(),
            Self::Infra(_) => None,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(ErrorCode::RateLimitExceeded.as_str(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(ErrorCode::OtpNotFound.as_str(), "OTP_NOT_FOUND");
        assert_eq!(ErrorCode::ResourceLocked.as_str(), "RESOURCE_LOCKED");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ErrorCode::InvalidOtp.http_status(), 400);
        assert_eq!(ErrorCode::TokenRevoked.http_status(), 401);
        assert_eq!(ErrorCode::VehicleNotFound.http_status(), 404);
        assert_eq!(ErrorCode::AccountLocked.http_status(), 429);
        assert_eq!(ErrorCode::ResourceLocked.http_status(), 503);
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let err = DomainError::rate_limited(ErrorCode::RateLimitExceeded, "slow down", 42);
        assert_eq!(err.retry_after(), Some(42));
        assert_eq!(err.code(), ErrorCode::RateLimitExceeded);
    }
}
