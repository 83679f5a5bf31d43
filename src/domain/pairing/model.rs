//! Paired-device domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::vehicle::VehicleStatic;

/// A Bluetooth pairing between a user and a vehicle.
///
/// At most one active paired device exists per `(user_id, chassis_number)`
/// pair; re-pairing refreshes the existing row instead of inserting a
/// duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedDevice {
    pub id: String,
    pub user_id: String,
    pub vehicle_id: String,
    pub chassis_number: String,
    pub reg_number: String,
    pub bluetooth_mac: Option<String>,
    pub is_active: bool,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Caller-supplied UUID, unique per user when present.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to execute one pairing request.
#[derive(Debug, Clone)]
pub struct PairingCommand {
    pub user_id: String,
    pub chassis_number: String,
    pub reg_number: String,
    pub bluetooth_mac: Option<String>,
    pub vehicle_static: Option<VehicleStatic>,
    pub idempotency_key: Option<String>,
}

/// Result of a pairing transaction.
#[derive(Debug, Clone, Serialize)]
pub struct PairingOutcome {
    pub vehicle_id: String,
    pub paired_device_id: String,
    /// True when a new paired-device row was inserted (HTTP 201); false for
    /// a refresh of an existing pairing or an idempotent replay (HTTP 200).
    pub created: bool,
    /// True when the outcome was resolved purely from the idempotency key.
    pub idempotent_replay: bool,
    pub total_active: u64,
}

/// Latest vehicle status attached to listings; sourced from the hot store
/// with a relational fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestVehicleStatus {
    pub is_active: bool,
    pub last_seen: DateTime<Utc>,
    pub connected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percentage: Option<f64>,
}
