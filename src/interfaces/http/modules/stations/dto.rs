//! Station endpoint DTOs

use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct LocationBody {
    #[validate(range(min = -90.0, max = 90.0, message = "lat out of range"))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "lng out of range"))]
    pub lng: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FindStationsBody {
    #[validate(length(min = 1, max = 32, message = "regNumber is required"))]
    pub reg_number: String,
    #[validate(range(min = 0.0, max = 100.0, message = "batteryPercentage must be 0-100"))]
    pub battery_percentage: f64,
    #[validate(nested)]
    pub user_location: LocationBody,
    #[validate(nested)]
    pub destination: Option<LocationBody>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NearbyBody {
    #[validate(nested)]
    pub user_location: LocationBody,
    #[validate(range(min = 0.0, max = 200.0, message = "radiusKm must be 0-200"))]
    pub radius_km: Option<f64>,
}
