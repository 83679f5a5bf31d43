//! Charging station entity and geospatial primitives

use serde::{Deserialize, Serialize};

/// Mean Earth radius in km, used by the great-circle distance.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS-84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance between two coordinates, in km (haversine).
///
/// Routes are modeled as straight-line great-circle approximations; there
/// is no road-network routing anywhere in the platform.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Route-corridor test: a station lies "along the route" when the detour
/// through it adds at most `max_deviation_km` to the direct leg
/// (triangle-inequality slack).
pub fn is_along_route(
    user: Coordinates,
    station: Coordinates,
    destination: Coordinates,
    max_deviation_km: f64,
) -> bool {
    let via = haversine_km(user, station) + haversine_km(station, destination);
    via - haversine_km(user, destination) <= max_deviation_km
}

/// A charging plug on a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plug {
    #[serde(rename = "type")]
    pub plug_type: String,
    pub power: f64,
    pub available: bool,
}

/// A charging station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub power_kw: f64,
    pub plugs: Vec<Plug>,
    pub availability_status: String,
    pub operator_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pricing_info: serde_json::Value,
    pub amenities: Vec<String>,
}

impl Station {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_matches_known_leg() {
        // Bengaluru → Hyderabad, the discovery fixture route.
        let blr = Coordinates::new(13.0173603, 77.5501986);
        let hyd = Coordinates::new(17.4740185, 78.3204047);
        let d = haversine_km(blr, hyd);
        assert!((d - 502.0).abs() < 3.0, "got {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = Coordinates::new(12.9716, 77.5946);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn corridor_accepts_on_route_station() {
        let user = Coordinates::new(13.0, 77.5);
        let dest = Coordinates::new(14.0, 77.5);
        // Almost exactly on the straight line.
        let station = Coordinates::new(13.5, 77.51);
        assert!(is_along_route(user, station, dest, 10.0));
    }

    #[test]
    fn corridor_rejects_detour() {
        let user = Coordinates::new(13.0, 77.5);
        let dest = Coordinates::new(14.0, 77.5);
        // Well off to the side.
        let station = Coordinates::new(13.5, 78.5);
        assert!(!is_along_route(user, station, dest, 10.0));
    }

    #[test]
    fn coordinate_validation() {
        assert!(Coordinates::new(90.0, 180.0).is_valid());
        assert!(Coordinates::new(-90.0, -180.0).is_valid());
        assert!(!Coordinates::new(90.01, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.01).is_valid());
    }
}
