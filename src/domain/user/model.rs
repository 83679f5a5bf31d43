//! User domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account, keyed by canonical phone number.
///
/// Users are created by the registration subsystem; the OTP core only ever
/// flips `is_verified` and stamps `last_login_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Canonical international form (`+` followed by digits), unique.
    pub phone: String,
    /// Two-letter ISO country code.
    pub country_code: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// The user projection cached alongside phone-existence entries and
/// returned from the verify flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub phone: String,
    pub country_code: String,
    pub is_verified: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            phone: user.phone.clone(),
            country_code: user.country_code.clone(),
            is_verified: user.is_verified,
        }
    }
}
