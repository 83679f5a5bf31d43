//! Range-aware station discovery pipeline
//!
//! Composes the cached vehicle lookup, the range/strategy calculator, the
//! geo index (with relational fallback), the route-corridor filter, and
//! recommendation labeling into the route-optimized response. Zone lookups
//! are cached under a deliberately coarse key (0.1° location, 10 km radius
//! steps, 10% battery buckets) so nearby requests share one entry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::geo::StationGeoIndex;
use crate::domain::station::{haversine_km, is_along_route, Coordinates, Station};
use crate::domain::vehicle::{charging_strategy, ChargingStrategy, ChargingUrgency, Vehicle};
use crate::domain::{DomainError, DomainResult, ErrorCode, RepositoryProvider};
use crate::infrastructure::kv::KvStore;

/// Km per degree of latitude, for bounding-box fallback queries.
const KM_PER_DEGREE: f64 = 111.0;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub vehicle_cache_ttl: Duration,
    pub zone_cache_ttl: Duration,
    pub nearby_cache_ttl: Duration,
    pub max_deviation_km: f64,
    pub geo_limit: usize,
    pub default_nearby_radius_km: f64,
    pub max_nearby_radius_km: f64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            vehicle_cache_ttl: Duration::from_secs(300),
            zone_cache_ttl: Duration::from_secs(900),
            nearby_cache_ttl: Duration::from_secs(300),
            max_deviation_km: 10.0,
            geo_limit: 100,
            default_nearby_radius_km: 20.0,
            max_nearby_radius_km: 200.0,
        }
    }
}

/// Discovery request, validated by the HTTP layer.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub reg_number: String,
    pub battery_percentage: f64,
    pub user_location: Coordinates,
    pub destination: Option<Coordinates>,
}

/// A station annotated with distance and recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStation {
    #[serde(flatten)]
    pub station: Station,
    pub distance_from_user_km: f64,
    pub is_recommended: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub user: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Coordinates>,
    /// Straight-line placeholder; there is no road routing.
    pub polyline: Vec<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSafety {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_ratio: Option<f64>,
    pub level: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptimizedResponse {
    pub usable_range_km: f64,
    pub battery_percentage: f64,
    pub total_route_distance_km: f64,
    pub charging_urgency: ChargingUrgency,
    pub optimal_charging_point_km: f64,
    pub zones: crate::domain::vehicle::ZoneBoundaries,
    pub map_data: MapData,
    pub stations: Vec<RankedStation>,
    pub next_charging_stop: Option<RankedStation>,
    pub route_safety: RouteSafety,
}

/// Nearby-search hit (no vehicle context, so no recommendation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyResult {
    #[serde(flatten)]
    pub station: Station,
    pub distance_from_user_km: f64,
}

pub struct StationDiscoveryService {
    kv: Arc<dyn KvStore>,
    geo: Arc<StationGeoIndex>,
    repos: Arc<dyn RepositoryProvider>,
    config: DiscoveryConfig,
}

impl StationDiscoveryService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        geo: Arc<StationGeoIndex>,
        repos: Arc<dyn RepositoryProvider>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            kv,
            geo,
            repos,
            config,
        }
    }

    /// Route-optimized station discovery.
    pub async fn find_stations(
        &self,
        request: &DiscoveryRequest,
    ) -> DomainResult<RouteOptimizedResponse> {
        let vehicle = self.load_vehicle(&request.reg_number).await?;
        let strategy = charging_strategy(&vehicle, request.battery_percentage);
        let usable = strategy.usable_range_km;

        let total_route_distance_km = request
            .destination
            .map(|dest| haversine_km(request.user_location, dest))
            .unwrap_or(0.0);

        let search_radius = if total_route_distance_km > usable {
            (usable * 1.5).max(total_route_distance_km * 1.2)
        } else {
            usable
        };

        let stations = self
            .ranked_stations(request, &strategy, search_radius)
            .await?;

        let next_charging_stop = stations.iter().find(|s| s.is_recommended).cloned();
        let has_recommendation = next_charging_stop.is_some();

        let safety_ratio = (total_route_distance_km > 0.0)
            .then(|| usable / total_route_distance_km);
        let level = if request.battery_percentage <= 20.0 && !has_recommendation {
            "critical"
        } else {
            match safety_ratio {
                Some(ratio) if ratio < 1.2 => "risky",
                Some(ratio) if ratio < 1.5 => "moderate",
                _ => "safe",
            }
        };

        Ok(RouteOptimizedResponse {
            usable_range_km: usable,
            battery_percentage: request.battery_percentage,
            total_route_distance_km,
            charging_urgency: strategy.urgency,
            optimal_charging_point_km: strategy.optimal_charging_point_km,
            zones: strategy.zones.clone(),
            map_data: MapData {
                user: request.user_location,
                destination: request.destination,
                polyline: match request.destination {
                    Some(dest) => vec![request.user_location, dest],
                    None => vec![request.user_location],
                },
            },
            stations,
            next_charging_stop,
            route_safety: RouteSafety {
                safety_ratio,
                level,
            },
        })
    }

    /// Plain radius search around a location.
    pub async fn find_nearby(
        &self,
        location: Coordinates,
        radius_km: Option<f64>,
    ) -> DomainResult<Vec<NearbyResult>> {
        let radius = radius_km
            .unwrap_or(self.config.default_nearby_radius_km)
            .clamp(0.0, self.config.max_nearby_radius_km);

        let cache_key = format!(
            "stations:near:{:.1}:{:.1}:{}",
            location.lat,
            location.lng,
            bucket_10(radius)
        );
        if let Ok(Some(raw)) = self.kv.get(&cache_key).await {
            if let Ok(cached) = serde_json::from_str::<Vec<NearbyResult>>(&raw) {
                return Ok(cached);
            }
        }

        let candidates = self.candidates_within(location, radius).await?;
        let mut results: Vec<NearbyResult> = candidates
            .into_iter()
            .map(|(station, distance_from_user_km)| NearbyResult {
                station,
                distance_from_user_km,
            })
            .collect();
        results.sort_by(|a, b| a.distance_from_user_km.total_cmp(&b.distance_from_user_km));

        self.cache_json(&cache_key, &results, self.config.nearby_cache_ttl)
            .await;
        Ok(results)
    }

    /// Cache-aside vehicle lookup (`vehicle:{reg}`, 300 s).
    async fn load_vehicle(&self, reg_number: &str) -> DomainResult<Vehicle> {
        let key = format!("vehicle:{reg_number}");

        if let Ok(Some(raw)) = self.kv.get(&key).await {
            if let Ok(vehicle) = serde_json::from_str::<Vehicle>(&raw) {
                return Ok(vehicle);
            }
        }

        let vehicle = self
            .repos
            .vehicles()
            .find_by_reg_number(reg_number)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "Vehicle",
                field: "reg_number",
                value: reg_number.to_string(),
                code: ErrorCode::VehicleNotFound,
            })?;

        if let Ok(json) = serde_json::to_string(&vehicle) {
            if let Err(err) = self
                .kv
                .setex(&key, self.config.vehicle_cache_ttl, &json)
                .await
            {
                warn!(reg_number, error = %err, "Vehicle cache write failed");
            }
        }
        Ok(vehicle)
    }

    async fn ranked_stations(
        &self,
        request: &DiscoveryRequest,
        strategy: &ChargingStrategy,
        search_radius: f64,
    ) -> DomainResult<Vec<RankedStation>> {
        let zone_key = zone_cache_key(request, search_radius);

        if let Ok(Some(raw)) = self.kv.get(&zone_key).await {
            if let Ok(cached) = serde_json::from_str::<Vec<RankedStation>>(&raw) {
                debug!(zone_key, "Zone cache hit");
                return Ok(cached);
            }
        }

        let candidates = self
            .candidates_within(request.user_location, search_radius)
            .await?;

        let mut ranked: Vec<RankedStation> = candidates
            .into_iter()
            .filter(|(station, _)| match request.destination {
                Some(dest) => is_along_route(
                    request.user_location,
                    station.coordinates(),
                    dest,
                    self.config.max_deviation_km,
                ),
                None => true,
            })
            .map(|(station, distance_from_user_km)| RankedStation {
                is_recommended: strategy.is_recommended(distance_from_user_km),
                distance_from_user_km,
                station,
            })
            .collect();

        ranked.sort_by(|a, b| a.distance_from_user_km.total_cmp(&b.distance_from_user_km));

        self.cache_json(&zone_key, &ranked, self.config.zone_cache_ttl)
            .await;
        Ok(ranked)
    }

    /// Candidate stations within `radius_km`, with distances: geo index
    /// first, bounding-box relational fallback when the index is cold.
    async fn candidates_within(
        &self,
        center: Coordinates,
        radius_km: f64,
    ) -> DomainResult<Vec<(Station, f64)>> {
        let hits = self
            .geo
            .find_within_radius(center.lat, center.lng, radius_km, self.config.geo_limit)
            .await?;

        if !hits.is_empty() {
            let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
            let metas = self.geo.batch_get_metadata(&ids).await?;

            let mut out = Vec::with_capacity(hits.len());
            for (hit, meta) in hits.into_iter().zip(metas) {
                let station = match meta {
                    Some(station) => Some(station),
                    // Metadata hash expired; fall back to the authority.
                    None => self.repos.stations().find_by_id(&hit.id).await?,
                };
                if let Some(station) = station {
                    out.push((station, hit.distance_km));
                }
            }
            return Ok(out);
        }

        debug!("Geo index empty for radius query; falling back to relational store");
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lng_delta = radius_km / (KM_PER_DEGREE * center.lat.to_radians().cos().abs().max(0.01));

        let rows = self
            .repos
            .stations()
            .find_in_bounding_box(
                center.lat - lat_delta,
                center.lat + lat_delta,
                center.lng - lng_delta,
                center.lng + lng_delta,
            )
            .await?;

        let mut out: Vec<(Station, f64)> = rows
            .into_iter()
            .filter_map(|station| {
                let distance = haversine_km(center, station.coordinates());
                (distance <= radius_km).then_some((station, distance))
            })
            .collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1));
        out.truncate(self.config.geo_limit);
        Ok(out)
    }

    async fn cache_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };
        if let Err(err) = self.kv.setex(key, ttl, &json).await {
            warn!(key, error = %err, "Discovery cache write failed");
        }
    }
}

/// Coarse zone cache key: location to 0.1°, radius floored to 10 km steps,
/// battery bucketed to 10%. Requests differing only below that resolution
/// intentionally share an entry.
fn zone_cache_key(request: &DiscoveryRequest, search_radius: f64) -> String {
    let destination = match request.destination {
        Some(dest) => format!("{:.1}:{:.1}", dest.lat, dest.lng),
        None => "no_dest".to_string(),
    };
    format!(
        "stations:zone:route:{:.1}:{:.1}:{}:{}:{}",
        request.user_location.lat,
        request.user_location.lng,
        bucket_10(search_radius),
        bucket_10(request.battery_percentage),
        destination
    )
}

fn bucket_10(value: f64) -> i64 {
    ((value / 10.0).floor() * 10.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::StubRepos;
    use crate::domain::station::Plug;
    use crate::infrastructure::kv::MemoryKv;
    use chrono::Utc;

    const USER: Coordinates = Coordinates {
        lat: 13.0173603,
        lng: 77.5501986,
    };
    const DEST: Coordinates = Coordinates {
        lat: 17.4740185,
        lng: 78.3204047,
    };

    fn fixture_vehicle() -> Vehicle {
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

    fn station(id: &str, lat: f64, lng: f64) -> Station {
        Station {
            id: id.to_string(),
            latitude: lat,
            longitude: lng,
            name: format!("Station {id}"),
            power_kw: 60.0,
            plugs: vec![Plug {
                plug_type: "CCS2".to_string(),
                power: 60.0,
                available: true,
            }],
            availability_status: "available".to_string(),
            operator_name: "Voltra Energy".to_string(),
            address: "NH44".to_string(),
            city: "Bengaluru".to_string(),
            state: "KA".to_string(),
            pricing_info: serde_json::json!({ "per_kwh": 19.0 }),
            amenities: vec![],
        }
    }

    struct Harness {
        service: StationDiscoveryService,
        geo: Arc<StationGeoIndex>,
    }

    fn harness(repos: StubRepos) -> Harness {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let geo = Arc::new(StationGeoIndex::new(Arc::clone(&kv)));
        Harness {
            service: StationDiscoveryService::new(
                kv,
                Arc::clone(&geo),
                Arc::new(repos),
                DiscoveryConfig::default(),
            ),
            geo,
        }
    }

    fn request(battery: f64, destination: Option<Coordinates>) -> DiscoveryRequest {
        DiscoveryRequest {
            reg_number: "ABC123".to_string(),
            battery_percentage: battery,
            user_location: USER,
            destination,
        }
    }

    #[tokio::test]
    async fn unknown_vehicle_is_a_404() {
        let h = harness(StubRepos::default());
        let err = h.service.find_stations(&request(50.0, None)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::VehicleNotFound);
    }

    #[tokio::test]
    async fn bengaluru_hyderabad_fixture() {
        // battery 85.5% of a 30 kWh pack with the historical multiplier
        // formula: usable range clamps to 0, yet corridor stations are
        // still returned and only near-user ones are recommended.
        let h = harness(StubRepos::default().with_vehicle(fixture_vehicle()));
        h.geo
            .batch_add(&[
                station("st-near", 13.05, 77.60),  // ~7 km, on corridor
                station("st-mid", 15.25, 77.95),   // mid-route, on corridor
                station("st-off", 13.00, 76.20),   // far west, off corridor
            ])
            .await
            .unwrap();

        let response = h
            .service
            .find_stations(&request(85.5, Some(DEST)))
            .await
            .unwrap();

        assert_eq!(response.usable_range_km, 0.0);
        assert!((response.total_route_distance_km - 502.0).abs() < 3.0);
        assert_eq!(response.route_safety.level, "risky");
        assert!(response.route_safety.safety_ratio.unwrap() < 1.2);

        let ids: Vec<&str> = response
            .stations
            .iter()
            .map(|s| s.station.id.as_str())
            .collect();
        assert!(ids.contains(&"st-near"));
        assert!(ids.contains(&"st-mid"));
        assert!(!ids.contains(&"st-off"), "off-corridor station must be filtered");

        for ranked in &response.stations {
            assert_eq!(
                ranked.is_recommended,
                ranked.distance_from_user_km <= 15.0,
                "with zero usable range only near-user stations are recommended"
            );
        }

        let next = response.next_charging_stop.unwrap();
        assert_eq!(next.station.id, "st-near");

        // Sorted ascending by distance.
        for pair in response.stations.windows(2) {
            assert!(pair[0].distance_from_user_km <= pair[1].distance_from_user_km);
        }
    }

    #[tokio::test]
    async fn relational_fallback_when_geo_index_is_cold() {
        let h = harness(
            StubRepos::default()
                .with_vehicle(fixture_vehicle())
                .with_station(station("st-db", 13.05, 77.60)),
        );

        let response = h
            .service
            .find_stations(&request(85.5, Some(DEST)))
            .await
            .unwrap();

        assert_eq!(response.stations.len(), 1);
        assert_eq!(response.stations[0].station.id, "st-db");
    }

    #[tokio::test]
    async fn zone_cache_serves_second_request() {
        let h = harness(StubRepos::default().with_vehicle(fixture_vehicle()));
        h.geo
            .batch_add(&[station("st-near", 13.05, 77.60)])
            .await
            .unwrap();

        let first = h
            .service
            .find_stations(&request(85.5, Some(DEST)))
            .await
            .unwrap();
        assert_eq!(first.stations.len(), 1);

        // Mutate the index; the cached zone keeps answering.
        h.geo.remove("st-near").await.unwrap();
        let second = h
            .service
            .find_stations(&request(85.5, Some(DEST)))
            .await
            .unwrap();
        assert_eq!(second.stations.len(), 1);
    }

    #[tokio::test]
    async fn nearby_clamps_radius_and_sorts() {
        let h = harness(StubRepos::default());
        h.geo
            .batch_add(&[
                station("st-1", 13.05, 77.60),
                station("st-2", 13.10, 77.65),
            ])
            .await
            .unwrap();

        let results = h
            .service
            .find_nearby(USER, Some(10_000.0)) // clamped to 200 km
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].distance_from_user_km <= results[1].distance_from_user_km);
    }

    #[test]
    fn zone_key_is_coarse() {
        let a = zone_cache_key(&request(85.0, Some(DEST)), 120.0);
        // Sub-0.1° movement and sub-10 km radius change collide by design.
        let mut moved = request(89.0, Some(DEST));
        moved.user_location = Coordinates::new(USER.lat + 0.01, USER.lng + 0.01);
        let b = zone_cache_key(&moved, 125.0);
        assert_eq!(a, b);

        // A different battery bucket gets its own entry.
        let c = zone_cache_key(&request(45.0, Some(DEST)), 120.0);
        assert_ne!(a, c);
    }
}
