//! Range and charging-strategy calculation
//!
//! The range arithmetic intentionally reproduces the platform's historical
//! formula, which multiplies by `efficiency_kwh_per_km` even though the
//! field name suggests a division. Downstream fixtures depend on this
//! exact arithmetic, so it must not be "corrected" here.

use serde::Serialize;

use super::model::Vehicle;

/// Fraction of usable range treated as the safety buffer zone.
const SAFETY_BUFFER_FRACTION: f64 = 0.18;
/// Optimal charging window, as fractions of usable range.
const OPTIMAL_ZONE: (f64, f64) = (0.69, 0.88);
/// Priority charging window, as fractions of usable range.
const PRIORITY_ZONE: (f64, f64) = (0.75, 0.81);
/// Fraction of usable range considered the maximum sensible travel leg.
const MAX_TRAVEL_FRACTION: f64 = 0.8;
/// Tolerance around the optimal charging point for recommendations, km.
const RECOMMENDATION_TOLERANCE_KM: f64 = 15.0;

/// Energy and range derived from a vehicle spec and battery percentage.
#[derive(Debug, Clone, Serialize)]
pub struct RangeEstimate {
    pub available_energy_kwh: f64,
    pub theoretical_range_km: f64,
    /// Derated, reserve-adjusted range, clamped to zero.
    pub usable_range_km: f64,
}

/// How urgently the driver should charge, from battery percentage bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargingUrgency {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl ChargingUrgency {
    pub fn from_battery_percentage(p: f64) -> Self {
        if p <= 20.0 {
            Self::Critical
        } else if p <= 35.0 {
            Self::High
        } else if p <= 50.0 {
            Self::Medium
        } else if p <= 70.0 {
            Self::Low
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Zone boundaries in km, derived from usable range.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneBoundaries {
    pub safety_buffer_km: f64,
    pub optimal_min_km: f64,
    pub optimal_max_km: f64,
    pub priority_min_km: f64,
    pub priority_max_km: f64,
}

/// The battery strategy used to label stations with recommendations.
#[derive(Debug, Clone, Serialize)]
pub struct ChargingStrategy {
    pub battery_percentage: f64,
    pub usable_range_km: f64,
    pub max_travel_km: f64,
    pub optimal_charging_point_km: f64,
    pub urgency: ChargingUrgency,
    pub zones: ZoneBoundaries,
}

/// Compute the range estimate for a vehicle at a battery percentage.
pub fn estimate_range(vehicle: &Vehicle, battery_percentage: f64) -> RangeEstimate {
    let available_energy_kwh = (battery_percentage / 100.0) * vehicle.battery_capacity_kwh;
    let theoretical_range_km = available_energy_kwh * vehicle.efficiency_kwh_per_km;
    let usable_range_km =
        (theoretical_range_km * vehicle.efficiency_factor - vehicle.reserve_km).max(0.0);

    RangeEstimate {
        available_energy_kwh,
        theoretical_range_km,
        usable_range_km,
    }
}

/// Derive the full charging strategy for a vehicle at a battery percentage.
pub fn charging_strategy(vehicle: &Vehicle, battery_percentage: f64) -> ChargingStrategy {
    let usable = estimate_range(vehicle, battery_percentage).usable_range_km;
    let max_travel_km = usable * MAX_TRAVEL_FRACTION;

    let optimal_charging_point_km = if battery_percentage <= 20.0 {
        // Charge at the first opportunity
        5.0
    } else if battery_percentage <= 35.0 {
        0.30 * max_travel_km
    } else if battery_percentage <= 50.0 {
        0.50 * max_travel_km
    } else if battery_percentage <= 70.0 {
        0.70 * max_travel_km
    } else {
        0.80 * max_travel_km
    };

    ChargingStrategy {
        battery_percentage,
        usable_range_km: usable,
        max_travel_km,
        optimal_charging_point_km,
        urgency: ChargingUrgency::from_battery_percentage(battery_percentage),
        zones: ZoneBoundaries {
            safety_buffer_km: usable * SAFETY_BUFFER_FRACTION,
            optimal_min_km: usable * OPTIMAL_ZONE.0,
            optimal_max_km: usable * OPTIMAL_ZONE.1,
            priority_min_km: usable * PRIORITY_ZONE.0,
            priority_max_km: usable * PRIORITY_ZONE.1,
        },
    }
}

impl ChargingStrategy {
    /// Whether a station at `distance_km` from the user should be
    /// recommended under this strategy.
    ///
    /// Low-battery overrides widen the net: at or below 20% any station
    /// within tolerance of the user qualifies; at or below 35% a station
    /// also qualifies when within twice the tolerance.
    pub fn is_recommended(&self, distance_km: f64) -> bool {
        if self.battery_percentage <= 20.0 {
            return distance_km <= RECOMMENDATION_TOLERANCE_KM;
        }

        let near_optimal =
            (distance_km - self.optimal_charging_point_km).abs() <= RECOMMENDATION_TOLERANCE_KM;

        if self.battery_percentage <= 35.0 {
            return near_optimal || distance_km <= 2.0 * RECOMMENDATION_TOLERANCE_KM;
        }

        near_optimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_vehicle() -> Vehicle {
        Vehicle {
            id: "veh-1".to_string(),
            reg_number: "ABC123".to_string(),
            chassis_number: "CH-001".to_string(),
            user_id: Some("u1".to_string()),
            make: "Voltra".to_string(),
            model: "S1".to_string(),
            year: 2024,
            battery_capacity_kwh: 30.0,
            efficiency_kwh_per_km: 0.15,
            efficiency_factor: 0.88,
            reserve_km: 7.0,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn historical_formula_is_preserved() {
        // 85.5% of 30 kWh = 25.65 kWh; 25.65 * 0.15 = 3.8475 km theoretical.
        let est = estimate_range(&sample_vehicle(), 85.5);
        assert!((est.available_energy_kwh - 25.65).abs() < 1e-9);
        assert!((est.theoretical_range_km - 3.8475).abs() < 1e-9);
        // 3.8475 * 0.88 - 7 is negative, so usable clamps to zero.
        assert_eq!(est.usable_range_km, 0.0);
    }

    #[test]
    fn positive_usable_range() {
        let mut v = sample_vehicle();
        v.efficiency_kwh_per_km = 6.5; // km per kWh in the source's units
        let est = estimate_range(&v, 80.0);
        // 24 kWh * 6.5 = 156 km; 156 * 0.88 - 7 = 130.28 km
        assert!((est.usable_range_km - 130.28).abs() < 1e-9);
    }

    #[test]
    fn zero_battery_yields_zero_range() {
        let mut v = sample_vehicle();
        v.efficiency_kwh_per_km = 6.5;
        let est = estimate_range(&v, 0.0);
        assert_eq!(est.usable_range_km, 0.0);
    }

    #[test]
    fn urgency_bands() {
        assert_eq!(
            ChargingUrgency::from_battery_percentage(20.0),
            ChargingUrgency::Critical
        );
        assert_eq!(
            ChargingUrgency::from_battery_percentage(20.1),
            ChargingUrgency::High
        );
        assert_eq!(
            ChargingUrgency::from_battery_percentage(35.1),
            ChargingUrgency::Medium
        );
        assert_eq!(
            ChargingUrgency::from_battery_percentage(50.1),
            ChargingUrgency::Low
        );
        assert_eq!(
            ChargingUrgency::from_battery_percentage(70.1),
            ChargingUrgency::None
        );
    }

    #[test]
    fn zones_scale_with_usable_range() {
        let mut v = sample_vehicle();
        v.efficiency_kwh_per_km = 6.5;
        let strategy = charging_strategy(&v, 80.0);
        let usable = strategy.usable_range_km;
        assert!((strategy.zones.safety_buffer_km - usable * 0.18).abs() < 1e-9);
        assert!((strategy.zones.optimal_min_km - usable * 0.69).abs() < 1e-9);
        assert!((strategy.zones.optimal_max_km - usable * 0.88).abs() < 1e-9);
        assert!((strategy.zones.priority_min_km - usable * 0.75).abs() < 1e-9);
        assert!((strategy.zones.priority_max_km - usable * 0.81).abs() < 1e-9);
    }

    #[test]
    fn optimal_point_thresholds() {
        let mut v = sample_vehicle();
        v.efficiency_kwh_per_km = 6.5;

        let s = charging_strategy(&v, 15.0);
        assert_eq!(s.optimal_charging_point_km, 5.0);

        let s = charging_strategy(&v, 30.0);
        assert!((s.optimal_charging_point_km - 0.30 * s.max_travel_km).abs() < 1e-9);

        let s = charging_strategy(&v, 45.0);
        assert!((s.optimal_charging_point_km - 0.50 * s.max_travel_km).abs() < 1e-9);

        let s = charging_strategy(&v, 65.0);
        assert!((s.optimal_charging_point_km - 0.70 * s.max_travel_km).abs() < 1e-9);

        let s = charging_strategy(&v, 90.0);
        assert!((s.optimal_charging_point_km - 0.80 * s.max_travel_km).abs() < 1e-9);
    }

    #[test]
    fn critical_battery_recommends_only_nearby_stations() {
        let strategy = charging_strategy(&sample_vehicle(), 10.0);
        assert!(strategy.is_recommended(14.9));
        assert!(strategy.is_recommended(15.0));
        assert!(!strategy.is_recommended(15.1));
    }

    #[test]
    fn low_battery_widens_to_thirty_km() {
        let mut v = sample_vehicle();
        v.efficiency_kwh_per_km = 6.5;
        let strategy = charging_strategy(&v, 30.0);
        // Far from optimal but inside the 30 km override window.
        assert!(strategy.is_recommended(29.0));
        let far = strategy.optimal_charging_point_km + 16.0;
        if far > 30.0 {
            assert!(!strategy.is_recommended(far));
        }
    }

    #[test]
    fn normal_battery_recommends_near_optimal_point() {
        let mut v = sample_vehicle();
        v.efficiency_kwh_per_km = 6.5;
        let strategy = charging_strategy(&v, 80.0);
        let ocp = strategy.optimal_charging_point_km;
        assert!(strategy.is_recommended(ocp + 14.9));
        assert!(strategy.is_recommended(ocp - 14.9));
        assert!(!strategy.is_recommended(ocp + 15.1));
    }

    #[test]
    fn zero_range_strategy_recommends_within_tolerance() {
        // The 85.5% fixture: usable range is 0, optimal point collapses to
        // 0, so only stations within 15 km qualify.
        let strategy = charging_strategy(&sample_vehicle(), 85.5);
        assert_eq!(strategy.usable_range_km, 0.0);
        assert!(strategy.is_recommended(10.0));
        assert!(!strategy.is_recommended(20.0));
    }
}
