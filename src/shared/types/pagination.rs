//! Cursor pagination primitives
//!
//! Cursors pin a `(timestamp, id)` tuple so pages stay stable under
//! concurrent inserts. The wire form is base64-encoded JSON.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{DomainError, DomainResult};

/// Opaque pagination cursor: the sort timestamp and id of the last row of
/// the previous page. Ties on the timestamp are broken by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub last_seen: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        // Serialization of a two-field struct cannot fail
        let json = serde_json::to_vec(self).expect("cursor serialization");
        BASE64.encode(json)
    }

    pub fn decode(raw: &str) -> DomainResult<Self> {
        let bytes = BASE64
            .decode(raw.trim())
            .map_err(|_| DomainError::invalid_cursor())?;
        serde_json::from_slice(&bytes).map_err(|_| DomainError::invalid_cursor())
    }
}

/// Page metadata returned alongside every cursor-paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub next_cursor: Option<String>,
    pub limit: u32,
    pub has_more: bool,
}

/// Clamp a requested page size into the supported `[1, 100]` window.
pub fn clamp_limit(limit: Option<u32>, default: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, 100)
}
