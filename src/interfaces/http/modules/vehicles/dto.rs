//! Vehicle/pairing endpoint DTOs

use serde::Deserialize;
use validator::Validate;

use crate::domain::vehicle::VehicleStatic;

#[derive(Debug, Deserialize, Validate)]
pub struct PairBody {
    #[validate(length(min = 1, max = 64, message = "chassis_number is required"))]
    pub chassis_number: String,
    #[validate(length(min = 1, max = 32, message = "reg_number is required"))]
    pub reg_number: String,
    #[validate(length(max = 32, message = "bluetooth_mac too long"))]
    pub bluetooth_mac: Option<String>,
    pub vehicle_static: Option<VehicleStatic>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PairedDevicesQuery {
    pub active: Option<bool>,
    /// Comma-separated expansions: `vehicle`, `latest_status`.
    pub include: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct VehiclesQuery {
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
    pub selected_vehicle_id: Option<String>,
}
