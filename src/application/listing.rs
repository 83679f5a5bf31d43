//! Paired-device and vehicle listings
//!
//! Cursor-paginated listings behind a versioned cache: every cache key
//! embeds a per-user version counter, so invalidation is one `incr` and
//! the old keys simply become unreachable. Counts are served from hot
//! counter keys and recounted from the relational store on miss.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::pairing::{
    LatestVehicleStatus, ListSort, PairedDevice, PairedDeviceQuery,
};
use crate::domain::vehicle::Vehicle;
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::infrastructure::kv::KvStore;
use crate::shared::types::pagination::{clamp_limit, Cursor, PageInfo};

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub cache_ttl: Duration,
    pub version_ttl: Duration,
    pub counter_ttl: Duration,
    pub default_limit: u32,
    /// Base URL for resolving relative vehicle image paths.
    pub asset_base_url: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            version_ttl: Duration::from_secs(7 * 86400),
            counter_ttl: Duration::from_secs(3600),
            default_limit: 20,
            asset_base_url: "https://assets.voltra.energy".to_string(),
        }
    }
}

/// Query parameters of the paired-device listing.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub user_id: String,
    pub active: Option<bool>,
    pub include_vehicle: bool,
    pub include_latest_status: bool,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedDeviceItem {
    #[serde(flatten)]
    pub device: PairedDevice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
    /// Always present when requested; `null` when no status is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_status: Option<Option<LatestVehicleStatus>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPage {
    pub data: Vec<PairedDeviceItem>,
    pub page_info: PageInfo,
    pub total_active: u64,
    pub total_all: u64,
}

/// Projection used by the vehicles listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStatusSummary {
    pub battery_capacity_kwh: f64,
    pub range_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleListItem {
    pub vehicle_id: String,
    pub reg_number: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_active: bool,
    pub status: VehicleStatusSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclesPage {
    pub data: Vec<VehicleListItem>,
    pub page_info: PageInfo,
    pub total_active: u64,
    pub total_all: u64,
}

/// Query parameters of the vehicles listing.
#[derive(Debug, Clone, Default)]
pub struct VehicleListParams {
    pub user_id: String,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub sort: Option<String>,
    pub selected_vehicle_id: Option<String>,
}

fn lvs_key(vehicle_id: &str) -> String {
    format!("lvs:{vehicle_id}")
}

pub struct PairedDeviceListingService {
    kv: Arc<dyn KvStore>,
    repos: Arc<dyn RepositoryProvider>,
    config: ListingConfig,
}

impl PairedDeviceListingService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        repos: Arc<dyn RepositoryProvider>,
        config: ListingConfig,
    ) -> Self {
        Self { kv, repos, config }
    }

    /// O(1) cache invalidation: bump both per-user versions and refresh
    /// the hot counters. Called after every pairing mutation.
    pub async fn invalidate_user(&self, user_id: &str) {
        for key in [
            format!("paired:ver:{user_id}"),
            format!("vehicles:ver:{user_id}"),
        ] {
            match self.kv.incr(&key).await {
                Ok(_) => {
                    let _ = self.kv.expire(&key, self.config.version_ttl).await;
                }
                Err(err) => warn!(key, error = %err, "Version bump failed"),
            }
        }

        if let Err(err) = self.refresh_counters(user_id).await {
            warn!(user_id, error = %err, "Counter refresh failed");
        }
    }

    /// Cursor-paginated paired-device listing with optional expansions.
    pub async fn list(&self, params: &ListParams) -> DomainResult<ListingPage> {
        let limit = clamp_limit(params.limit, self.config.default_limit);
        let sort = match params.sort.as_deref() {
            None => ListSort::default(),
            Some(raw) => ListSort::parse(raw)
                .ok_or_else(|| DomainError::validation(format!("Unknown sort '{raw}'")))?,
        };
        let cursor = match &params.cursor {
            Some(raw) => Some(Cursor::decode(raw)?),
            None => None,
        };

        let version = self.version(&format!("paired:ver:{}", params.user_id)).await;
        let cache_key = format!(
            "paired:list:{}:v{}:{}:{}{}:{}:{}:{}",
            params.user_id,
            version,
            params.active.map_or("all".into(), |a| a.to_string()),
            u8::from(params.include_vehicle),
            u8::from(params.include_latest_status),
            limit,
            params.cursor.as_deref().unwrap_or("-"),
            params.sort.as_deref().unwrap_or("last_seen_desc"),
        );

        if let Ok(Some(raw)) = self.kv.get(&cache_key).await {
            if let Ok(page) = serde_json::from_str::<ListingPage>(&raw) {
                return Ok(page);
            }
        }

        // Fetch one extra row to detect whether a next page exists.
        let mut rows = self
            .repos
            .paired_devices()
            .list_page(PairedDeviceQuery {
                user_id: params.user_id.clone(),
                active: params.active,
                sort,
                cursor,
                limit: u64::from(limit) + 1,
            })
            .await?;

        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);

        let next_cursor = if has_more {
            rows.last().map(|row| {
                Cursor {
                    last_seen: match sort {
                        ListSort::LastSeenDesc => row.last_seen,
                        ListSort::ConnectedAtDesc => row.connected_at,
                    },
                    id: row.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        let vehicles = if params.include_vehicle {
            let ids: Vec<String> = rows.iter().map(|r| r.vehicle_id.clone()).collect();
            self.repos.vehicles().find_by_ids(&ids).await?
        } else {
            Vec::new()
        };

        let statuses = if params.include_latest_status {
            Some(self.latest_statuses(&rows).await)
        } else {
            None
        };

        let data: Vec<PairedDeviceItem> = rows
            .into_iter()
            .enumerate()
            .map(|(i, device)| PairedDeviceItem {
                vehicle: params
                    .include_vehicle
                    .then(|| {
                        vehicles
                            .iter()
                            .find(|v| v.id == device.vehicle_id)
                            .cloned()
                    })
                    .flatten(),
                latest_status: statuses.as_ref().map(|s| s[i].clone()),
                device,
            })
            .collect();

        let (total_active, total_all) = self.counts(&params.user_id).await?;

        let page = ListingPage {
            data,
            page_info: PageInfo {
                next_cursor,
                limit,
                has_more,
            },
            total_active,
            total_all,
        };

        if let Ok(json) = serde_json::to_string(&page) {
            if let Err(err) = self.kv.setex(&cache_key, self.config.cache_ttl, &json).await {
                warn!(error = %err, "Listing cache write failed");
            }
        }

        Ok(page)
    }

    /// Vehicles projection over the same machinery, with an optional
    /// pinned vehicle prepended to the page.
    pub async fn list_vehicles(&self, params: &VehicleListParams) -> DomainResult<VehiclesPage> {
        let version = self
            .version(&format!("vehicles:ver:{}", params.user_id))
            .await;
        let cache_key = format!(
            "paired:list:vehicles:{}:v{}:{}:{}:{}:{}:{}",
            params.user_id,
            version,
            params.active.map_or("all".into(), |a| a.to_string()),
            clamp_limit(params.limit, self.config.default_limit),
            params.cursor.as_deref().unwrap_or("-"),
            params.sort.as_deref().unwrap_or("last_seen_desc"),
            params.selected_vehicle_id.as_deref().unwrap_or("-"),
        );

        if let Ok(Some(raw)) = self.kv.get(&cache_key).await {
            if let Ok(page) = serde_json::from_str::<VehiclesPage>(&raw) {
                return Ok(page);
            }
        }

        let inner = self
            .list(&ListParams {
                user_id: params.user_id.clone(),
                active: params.active,
                include_vehicle: true,
                include_latest_status: false,
                limit: params.limit,
                cursor: params.cursor.clone(),
                sort: params.sort.clone(),
            })
            .await?;

        let mut data: Vec<VehicleListItem> = inner
            .data
            .iter()
            .filter_map(|item| {
                item.vehicle
                    .as_ref()
                    .map(|vehicle| self.project_vehicle(vehicle, item.device.is_active))
            })
            .collect();

        // Pin the selected vehicle to the top, fetching it when it falls
        // outside the natural window.
        if let Some(selected_id) = &params.selected_vehicle_id {
            if let Some(pos) = data.iter().position(|v| &v.vehicle_id == selected_id) {
                let selected = data.remove(pos);
                data.insert(0, selected);
            } else if let Some(vehicle) = self.repos.vehicles().find_by_id(selected_id).await? {
                let device = self
                    .repos
                    .paired_devices()
                    .find_by_user_and_vehicle(&params.user_id, selected_id)
                    .await?;
                if let Some(device) = device {
                    data.insert(0, self.project_vehicle(&vehicle, device.is_active));
                }
            }
        }

        let page = VehiclesPage {
            data,
            page_info: inner.page_info,
            total_active: inner.total_active,
            total_all: inner.total_all,
        };

        if let Ok(json) = serde_json::to_string(&page) {
            if let Err(err) = self.kv.setex(&cache_key, self.config.cache_ttl, &json).await {
                warn!(error = %err, "Vehicles listing cache write failed");
            }
        }

        Ok(page)
    }

    fn project_vehicle(&self, vehicle: &Vehicle, is_active: bool) -> VehicleListItem {
        let range_km = if vehicle.efficiency_kwh_per_km > 0.0 {
            vehicle.battery_capacity_kwh / vehicle.efficiency_kwh_per_km
        } else {
            0.0
        };

        VehicleListItem {
            vehicle_id: vehicle.id.clone(),
            reg_number: vehicle.reg_number.clone(),
            display_name: format!("{} {}", vehicle.make, vehicle.model),
            image_url: vehicle
                .image_url
                .as_ref()
                .map(|url| self.absolute_asset_url(url)),
            is_active,
            status: VehicleStatusSummary {
                battery_capacity_kwh: vehicle.battery_capacity_kwh,
                range_km,
            },
        }
    }

    fn absolute_asset_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.asset_base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    /// Batch latest-status reads: hot store first, device-row fallback.
    async fn latest_statuses(&self, rows: &[PairedDevice]) -> Vec<Option<LatestVehicleStatus>> {
        let keys: Vec<String> = rows.iter().map(|r| lvs_key(&r.vehicle_id)).collect();
        let cached = match self.kv.mget(&keys).await {
            Ok(values) => values,
            Err(err) => {
                warn!(error = %err, "Latest-status batch read failed");
                vec![None; rows.len()]
            }
        };

        rows.iter()
            .zip(cached)
            .map(|(device, raw)| {
                raw.and_then(|json| serde_json::from_str::<LatestVehicleStatus>(&json).ok())
                    .or_else(|| {
                        // Relational fallback: the pairing row is the only
                        // persisted status substrate.
                        Some(LatestVehicleStatus {
                            is_active: device.is_active,
                            last_seen: device.last_seen,
                            connected_at: device.connected_at,
                            battery_percentage: None,
                        })
                    })
            })
            .collect()
    }

    async fn version(&self, key: &str) -> i64 {
        match self.kv.get(key).await {
            Ok(Some(raw)) => raw.parse::<i64>().unwrap_or(1),
            Ok(None) => {
                if let Err(err) = self.kv.setex(key, self.config.version_ttl, "1").await {
                    warn!(key, error = %err, "Version init failed");
                }
                1
            }
            Err(err) => {
                warn!(key, error = %err, "Version read failed; bypassing cache");
                -1
            }
        }
    }

    async fn counts(&self, user_id: &str) -> DomainResult<(u64, u64)> {
        let active_key = format!("paired:count:active:{user_id}");
        let all_key = format!("paired:count:all:{user_id}");

        let cached = self
            .kv
            .mget(&[active_key.clone(), all_key.clone()])
            .await
            .unwrap_or_else(|_| vec![None, None]);

        let active = cached[0].as_ref().and_then(|v| v.parse::<u64>().ok());
        let all = cached[1].as_ref().and_then(|v| v.parse::<u64>().ok());

        match (active, all) {
            (Some(active), Some(all)) => Ok((active, all)),
            _ => {
                let (active, all) = self.recount(user_id).await?;
                Ok((active, all))
            }
        }
    }

    async fn refresh_counters(&self, user_id: &str) -> DomainResult<()> {
        self.recount(user_id).await?;
        Ok(())
    }

    async fn recount(&self, user_id: &str) -> DomainResult<(u64, u64)> {
        let repo = self.repos.paired_devices();
        let (active, all) = futures_util::join!(
            repo.count_for_user(user_id, true),
            repo.count_for_user(user_id, false)
        );
        let (active, all) = (active?, all?);

        let writes = [
            (format!("paired:count:active:{user_id}"), active),
            (format!("paired:count:all:{user_id}"), all),
        ];
        let writes: Vec<(String, String)> = writes
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let results = join_all(
            writes
                .iter()
                .map(|(key, value)| self.kv.setex(key, self.config.counter_ttl, value)),
        )
        .await;
        for result in results {
            if let Err(err) = result {
                warn!(error = %err, "Counter write failed");
            }
        }

        Ok((active, all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::StubRepos;
    use crate::infrastructure::kv::MemoryKv;
    use chrono::{Duration as ChronoDuration, Utc};

    fn device(id: &str, vehicle_id: &str, minutes_ago: i64, active: bool) -> PairedDevice {
        let at = Utc::now() - ChronoDuration::minutes(minutes_ago);
        PairedDevice {
            id: id.to_string(),
            user_id: "u1".to_string(),
            vehicle_id: vehicle_id.to_string(),
            chassis_number: format!("CH-{id}"),
            reg_number: format!("KA01{id}"),
            bluetooth_mac: None,
            is_active: active,
            connected_at: at,
            last_seen: at,
            idempotency_key: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn vehicle(id: &str) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            reg_number: format!("KA01{id}"),
            chassis_number: format!("CH-{id}"),
            user_id: Some("u1".to_string()),
            make: "Voltra".to_string(),
            model: "S1".to_string(),
            year: 2024,
            battery_capacity_kwh: 30.0,
            efficiency_kwh_per_km: 0.15,
            efficiency_factor: 0.88,
            reserve_km: 7.0,
            image_url: Some("img/s1.png".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Harness {
        service: PairedDeviceListingService,
        repos: Arc<StubRepos>,
        kv: Arc<dyn KvStore>,
    }

    fn harness(repos: StubRepos) -> Harness {
        let repos = Arc::new(repos);
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        Harness {
            service: PairedDeviceListingService::new(
                Arc::clone(&kv),
                Arc::clone(&repos) as Arc<dyn RepositoryProvider>,
                ListingConfig::default(),
            ),
            repos,
            kv,
        }
    }

    fn params(limit: u32, cursor: Option<String>) -> ListParams {
        ListParams {
            user_id: "u1".to_string(),
            limit: Some(limit),
            cursor,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn two_single_row_pages_equal_one_double_page() {
        let h = harness(
            StubRepos::default()
                .with_device(device("a", "v1", 30, true))
                .with_device(device("b", "v2", 10, true))
                .with_device(device("c", "v3", 20, false)),
        );

        let first = h.service.list(&params(1, None)).await.unwrap();
        assert_eq!(first.data.len(), 1);
        assert!(first.page_info.has_more);
        let cursor = first.page_info.next_cursor.clone().unwrap();

        let second = h.service.list(&params(1, Some(cursor))).await.unwrap();
        assert_eq!(second.data.len(), 1);

        let combined = h.service.list(&params(2, None)).await.unwrap();
        let combined_ids: Vec<&str> = combined.data.iter().map(|d| d.device.id.as_str()).collect();
        assert_eq!(
            combined_ids,
            vec![
                first.data[0].device.id.as_str(),
                second.data[0].device.id.as_str()
            ]
        );

        // Newest last_seen first.
        assert_eq!(combined_ids, vec!["b", "c"]);
        assert_eq!(combined.total_active, 2);
        assert_eq!(combined.total_all, 3);
    }

    #[tokio::test]
    async fn active_filter_and_counts() {
        let h = harness(
            StubRepos::default()
                .with_device(device("a", "v1", 30, true))
                .with_device(device("b", "v2", 10, false)),
        );

        let page = h
            .service
            .list(&ListParams {
                user_id: "u1".to_string(),
                active: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].device.id, "a");
        assert_eq!(page.total_active, 1);
        assert_eq!(page.total_all, 2);
    }

    #[tokio::test]
    async fn expansions_attach_vehicle_and_status() {
        let h = harness(
            StubRepos::default()
                .with_device(device("a", "v1", 5, true))
                .with_vehicle(vehicle("v1")),
        );

        // Seed one hot status; the other path exercises the fallback.
        h.kv.set(
            "lvs:v1",
            &serde_json::to_string(&LatestVehicleStatus {
                is_active: true,
                last_seen: Utc::now(),
                connected_at: Utc::now(),
                battery_percentage: Some(74.0),
            })
            .unwrap(),
        )
        .await
        .unwrap();

        let page = h
            .service
            .list(&ListParams {
                user_id: "u1".to_string(),
                include_vehicle: true,
                include_latest_status: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let item = &page.data[0];
        assert_eq!(item.vehicle.as_ref().unwrap().id, "v1");
        let status = item.latest_status.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(status.battery_percentage, Some(74.0));
    }

    #[tokio::test]
    async fn version_bump_invalidates_cached_page() {
        let h = harness(StubRepos::default().with_device(device("a", "v1", 30, true)));

        let first = h.service.list(&params(10, None)).await.unwrap();
        assert_eq!(first.data.len(), 1);

        // New pairing lands; without a bump the 30s cache would hide it.
        h.repos.add_device(device("b", "v2", 1, true));
        let stale = h.service.list(&params(10, None)).await.unwrap();
        assert_eq!(stale.data.len(), 1);

        h.service.invalidate_user("u1").await;
        let fresh = h.service.list(&params(10, None)).await.unwrap();
        assert_eq!(fresh.data.len(), 2);
        assert_eq!(fresh.total_all, 2);
    }

    #[tokio::test]
    async fn malformed_cursor_is_rejected() {
        let h = harness(StubRepos::default());
        let err = h
            .service
            .list(&params(10, Some("!!garbage!!".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::domain::ErrorCode::InvalidCursor);
    }

    #[tokio::test]
    async fn vehicles_projection_and_selected_pinning() {
        let h = harness(
            StubRepos::default()
                .with_device(device("a", "v1", 30, true))
                .with_device(device("b", "v2", 10, true))
                .with_vehicle(vehicle("v1"))
                .with_vehicle(vehicle("v2")),
        );

        let page = h
            .service
            .list_vehicles(&VehicleListParams {
                user_id: "u1".to_string(),
                selected_vehicle_id: Some("v1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        // v1 is pinned first even though v2 has the newer last_seen.
        assert_eq!(page.data[0].vehicle_id, "v1");
        assert_eq!(page.data[0].display_name, "Voltra S1");
        // 30 kWh / 0.15 = 200 km (projection divides).
        assert_eq!(page.data[0].status.range_km, 200.0);
        assert_eq!(
            page.data[0].image_url.as_deref(),
            Some("https://assets.voltra.energy/img/s1.png")
        );
    }
}
