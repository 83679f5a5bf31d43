//! OTP, session, and audit domain records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The OTP record stored in the hot store under `otp:{phone}`.
///
/// Only the HMAC of the code is persisted, never the code itself. The
/// attempts counter lives inside the record and is rewritten preserving
/// the remaining TTL on every failed verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub hmac: String,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Every OTP lifecycle event written to the append-only audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Requested,
    RequestRateLimited,
    RequestInvalid,
    RequestNonexistentPhone,
    SentFailed,
    Verified,
    VerifyFailed,
    VerifyExpired,
    VerifyLocked,
    VerifyNotFound,
    VerifyInvalidPhone,
    VerifyRateLimited,
    VerifyPhoneNotRegistered,
    TokenRefreshed,
    Logout,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::RequestRateLimited => "request_rate_limited",
            Self::RequestInvalid => "request_invalid",
            Self::RequestNonexistentPhone => "request_nonexistent_phone",
            Self::SentFailed => "sent_failed",
            Self::Verified => "verified",
            Self::VerifyFailed => "verify_failed",
            Self::VerifyExpired => "verify_expired",
            Self::VerifyLocked => "verify_locked",
            Self::VerifyNotFound => "verify_not_found",
            Self::VerifyInvalidPhone => "verify_invalid_phone",
            Self::VerifyRateLimited => "verify_rate_limited",
            Self::VerifyPhoneNotRegistered => "verify_phone_not_registered",
            Self::TokenRefreshed => "token_refreshed",
            Self::Logout => "logout",
        }
    }
}

/// One audit row. `phone` is the canonical form when normalization
/// succeeded, else the raw input.
#[derive(Debug, Clone)]
pub struct OtpAuditEntry {
    pub phone: String,
    pub event_type: AuditEventType,
    pub provider: Option<String>,
    pub provider_response: Option<serde_json::Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl OtpAuditEntry {
    pub fn new(phone: impl Into<String>, event_type: AuditEventType) -> Self {
        Self {
            phone: phone.into(),
            event_type,
            provider: None,
            provider_response: None,
            ip: None,
            user_agent: None,
            metadata: None,
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip = ip;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_provider(
        mut self,
        provider: impl Into<String>,
        response: Option<serde_json::Value>,
    ) -> Self {
        self.provider = Some(provider.into());
        self.provider_response = response;
        self
    }
}

/// Login session stored under `session:{userId}`, 7-day TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub phone: String,
    pub verified: bool,
    pub verified_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
    pub refresh_jti: String,
    pub created_at: DateTime<Utc>,
}

/// Refresh-token record stored under `refresh:{jti}`, 7-day TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub user_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Token pair handed to the client after a successful verify.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
}
