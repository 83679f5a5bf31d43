//! Vehicle domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default efficiency derating applied on top of the spec-sheet figure.
pub const DEFAULT_EFFICIENCY_FACTOR: f64 = 0.88;
/// Default reserve kept back from the usable range, in km.
pub const DEFAULT_RESERVE_KM: f64 = 7.0;

/// A vehicle known to the registry.
///
/// Either `reg_number` or `chassis_number` identifies a vehicle uniquely
/// across the whole registry; when both are present they must resolve to
/// the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    /// Canonical uppercase registration number, unique.
    pub reg_number: String,
    /// Unique chassis (VIN) number.
    pub chassis_number: String,
    /// Owning user, bound lazily on first pairing.
    pub user_id: Option<String>,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub battery_capacity_kwh: f64,
    pub efficiency_kwh_per_km: f64,
    pub efficiency_factor: f64,
    pub reserve_km: f64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Static vehicle attributes supplied by the pairing client.
///
/// Unknown JSON fields are preserved in `extra` so audit payloads stay
/// forward-compatible with newer app versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleStatic {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub battery_capacity_kwh: Option<f64>,
    pub efficiency_kwh_per_km: Option<f64>,
    pub efficiency_factor: Option<f64>,
    pub reserve_km: Option<f64>,
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Canonicalize a registration number: uppercase, no internal whitespace.
pub fn canonical_reg_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}
