//! Station geo index over the hot store
//!
//! Coordinates live in one geo-sorted structure; per-station metadata is a
//! hash with a 24-hour TTL refreshed on read. Structured fields (plugs,
//! pricing, amenities) are serialized as JSON strings inside the hash.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::warn;

use crate::domain::station::Station;
use crate::domain::DomainResult;
use crate::infrastructure::kv::{GeoEntry, KvStore};

const GEO_KEY: &str = "stations:geo";
const META_TTL: Duration = Duration::from_secs(86400);

fn meta_key(id: &str) -> String {
    format!("station:meta:{id}")
}

/// One radius-search hit.
#[derive(Debug, Clone)]
pub struct NearbyStation {
    pub id: String,
    pub distance_km: f64,
}

pub struct StationGeoIndex {
    kv: Arc<dyn KvStore>,
}

impl StationGeoIndex {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn add_station(&self, station: &Station) -> DomainResult<()> {
        self.kv
            .geo_add(
                GEO_KEY,
                &[GeoEntry {
                    member: station.id.clone(),
                    lat: station.latitude,
                    lng: station.longitude,
                }],
            )
            .await?;
        self.write_metadata(station).await
    }

    /// Pipelined bulk load, used by startup population.
    pub async fn batch_add(&self, stations: &[Station]) -> DomainResult<()> {
        if stations.is_empty() {
            return Ok(());
        }

        let entries: Vec<GeoEntry> = stations
            .iter()
            .map(|s| GeoEntry {
                member: s.id.clone(),
                lat: s.latitude,
                lng: s.longitude,
            })
            .collect();
        self.kv.geo_add(GEO_KEY, &entries).await?;

        let writes = stations.iter().map(|station| self.write_metadata(station));
        for result in join_all(writes).await {
            result?;
        }
        Ok(())
    }

    /// Stations within `radius_km`, ascending by distance.
    pub async fn find_within_radius(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: usize,
    ) -> DomainResult<Vec<NearbyStation>> {
        let hits = self.kv.geo_radius(GEO_KEY, lat, lng, radius_km, limit).await?;
        Ok(hits
            .into_iter()
            .map(|hit| NearbyStation {
                id: hit.member,
                distance_km: hit.distance_km,
            })
            .collect())
    }

    /// Parallel metadata fetch, preserving input order. Stations whose
    /// hash expired come back as `None`; reads refresh the TTL.
    pub async fn batch_get_metadata(&self, ids: &[String]) -> DomainResult<Vec<Option<Station>>> {
        let reads = ids.iter().map(|id| async move {
            let fields = self.kv.hgetall(&meta_key(id)).await?;
            if fields.is_empty() {
                return Ok::<_, crate::infrastructure::kv::KvError>(None);
            }
            let _ = self.kv.expire(&meta_key(id), META_TTL).await;
            Ok(fields_to_station(id, &fields))
        });

        let mut out = Vec::with_capacity(ids.len());
        for result in join_all(reads).await {
            out.push(result?);
        }
        Ok(out)
    }

    pub async fn remove(&self, id: &str) -> DomainResult<()> {
        self.kv.geo_remove(GEO_KEY, id).await?;
        self.kv.del(&meta_key(id)).await?;
        Ok(())
    }

    pub async fn station_count(&self) -> DomainResult<u64> {
        // The geo structure is a scored set underneath.
        Ok(self
            .kv
            .geo_radius(GEO_KEY, 0.0, 0.0, f64::MAX, usize::MAX)
            .await?
            .len() as u64)
    }

    async fn write_metadata(&self, station: &Station) -> DomainResult<()> {
        let fields = station_to_fields(station);
        self.kv.hset(&meta_key(&station.id), &fields).await?;
        self.kv.expire(&meta_key(&station.id), META_TTL).await?;
        Ok(())
    }
}

fn station_to_fields(station: &Station) -> Vec<(String, String)> {
    vec![
        ("name".into(), station.name.clone()),
        ("latitude".into(), station.latitude.to_string()),
        ("longitude".into(), station.longitude.to_string()),
        ("power_kw".into(), station.power_kw.to_string()),
        (
            "availability_status".into(),
            station.availability_status.clone(),
        ),
        ("operator_name".into(), station.operator_name.clone()),
        ("address".into(), station.address.clone()),
        ("city".into(), station.city.clone()),
        ("state".into(), station.state.clone()),
        (
            "plugs".into(),
            serde_json::to_string(&station.plugs).unwrap_or_else(|_| "[]".into()),
        ),
        (
            "pricing_info".into(),
            station.pricing_info.to_string(),
        ),
        (
            "amenities".into(),
            serde_json::to_string(&station.amenities).unwrap_or_else(|_| "[]".into()),
        ),
    ]
}

fn fields_to_station(
    id: &str,
    fields: &std::collections::HashMap<String, String>,
) -> Option<Station> {
    let get = |key: &str| fields.get(key).cloned();
    let parse_f64 = |key: &str| fields.get(key).and_then(|v| v.parse::<f64>().ok());

    let Some(latitude) = parse_f64("latitude") else {
        warn!(id, "Station metadata missing latitude");
        return None;
    };
    let Some(longitude) = parse_f64("longitude") else {
        warn!(id, "Station metadata missing longitude");
        return None;
    };

    Some(Station {
        id: id.to_string(),
        latitude,
        longitude,
        name: get("name").unwrap_or_default(),
        power_kw: parse_f64("power_kw").unwrap_or(0.0),
        plugs: get("plugs")
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
        availability_status: get("availability_status").unwrap_or_default(),
        operator_name: get("operator_name").unwrap_or_default(),
        address: get("address").unwrap_or_default(),
        city: get("city").unwrap_or_default(),
        state: get("state").unwrap_or_default(),
        pricing_info: get("pricing_info")
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(serde_json::Value::Null),
        amenities: get("amenities")
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::station::Plug;
    use crate::infrastructure::kv::MemoryKv;

    fn station(id: &str, lat: f64, lng: f64) -> Station {
        Station {
            id: id.to_string(),
            latitude: lat,
            longitude: lng,
            name: format!("Station {id}"),
            power_kw: 50.0,
            plugs: vec![Plug {
                plug_type: "CCS2".to_string(),
                power: 50.0,
                available: true,
            }],
            availability_status: "available".to_string(),
            operator_name: "Voltra Energy".to_string(),
            address: "MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "KA".to_string(),
            pricing_info: serde_json::json!({ "per_kwh": 18.5 }),
            amenities: vec!["cafe".to_string()],
        }
    }

    fn index() -> StationGeoIndex {
        StationGeoIndex::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn add_then_radius_search() {
        let idx = index();
        idx.batch_add(&[
            station("st-1", 12.98, 77.60),
            station("st-2", 13.20, 77.70),
            station("st-3", 17.47, 78.32),
        ])
        .await
        .unwrap();

        let hits = idx.find_within_radius(12.97, 77.59, 50.0, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["st-1", "st-2"]);
        assert!(hits[0].distance_km <= hits[1].distance_km);
    }

    #[tokio::test]
    async fn metadata_round_trip() {
        let idx = index();
        let original = station("st-1", 12.98, 77.60);
        idx.add_station(&original).await.unwrap();

        let metas = idx
            .batch_get_metadata(&["st-1".to_string(), "st-missing".to_string()])
            .await
            .unwrap();

        let restored = metas[0].as_ref().unwrap();
        assert_eq!(restored.name, "Station st-1");
        assert_eq!(restored.plugs.len(), 1);
        assert_eq!(restored.plugs[0].plug_type, "CCS2");
        assert_eq!(restored.pricing_info["per_kwh"], 18.5);
        assert_eq!(restored.amenities, vec!["cafe".to_string()]);
        assert!(metas[1].is_none());
    }

    #[tokio::test]
    async fn remove_drops_both_structures() {
        let idx = index();
        idx.add_station(&station("st-1", 12.98, 77.60)).await.unwrap();
        idx.remove("st-1").await.unwrap();

        assert!(idx
            .find_within_radius(12.98, 77.60, 5.0, 10)
            .await
            .unwrap()
            .is_empty());
        assert!(idx.batch_get_metadata(&["st-1".to_string()]).await.unwrap()[0].is_none());
    }

    #[tokio::test]
    async fn radius_limit_is_honored() {
        let idx = index();
        idx.batch_add(&[
            station("st-1", 12.98, 77.60),
            station("st-2", 12.99, 77.61),
            station("st-3", 13.00, 77.62),
        ])
        .await
        .unwrap();

        let hits = idx.find_within_radius(12.98, 77.60, 50.0, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }
}
