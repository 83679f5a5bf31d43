//! In-memory repository fakes shared by the service tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::otp::{AuditEventType, OtpAuditEntry, OtpAuditRepository};
use crate::domain::pairing::{
    PairedDevice, PairedDeviceQuery, PairedDeviceRepository, PairingCommand, PairingOutcome,
    PairingStore,
};
use crate::domain::station::{Station, StationRepository};
use crate::domain::user::{User, UserRepository};
use crate::domain::vehicle::{Vehicle, VehicleRepository};
use crate::domain::{DomainError, DomainResult, ListSort, RepositoryProvider};

/// Configurable in-memory repository provider.
#[derive(Default)]
pub struct StubRepos {
    users: RwLock<Vec<User>>,
    vehicles: RwLock<Vec<Vehicle>>,
    stations: RwLock<Vec<Station>>,
    devices: RwLock<Vec<PairedDevice>>,
    audits: Mutex<Vec<OtpAuditEntry>>,
    verified_user_ids: Mutex<Vec<String>>,
    user_lookups: AtomicU64,
    fail_user_lookups: AtomicBool,
    pairing_locked: AtomicBool,
    pairings_executed: AtomicU64,
}

impl StubRepos {
    pub fn with_user(self, user: User) -> Self {
        self.users.write().unwrap().push(user);
        self
    }

    pub fn with_vehicle(self, vehicle: Vehicle) -> Self {
        self.vehicles.write().unwrap().push(vehicle);
        self
    }

    pub fn with_station(self, station: Station) -> Self {
        self.stations.write().unwrap().push(station);
        self
    }

    pub fn with_device(self, device: PairedDevice) -> Self {
        self.devices.write().unwrap().push(device);
        self
    }

    pub fn add_device(&self, device: PairedDevice) {
        self.devices.write().unwrap().push(device);
    }

    pub fn clear_users(&self) {
        self.users.write().unwrap().clear();
    }

    pub fn fail_user_lookups(&self) {
        self.fail_user_lookups.store(true, Ordering::SeqCst);
    }

    pub fn lock_pairing(&self) {
        self.pairing_locked.store(true, Ordering::SeqCst);
    }

    pub fn user_lookups(&self) -> u64 {
        self.user_lookups.load(Ordering::SeqCst)
    }

    pub fn pairings_executed(&self) -> u64 {
        self.pairings_executed.load(Ordering::SeqCst)
    }

    pub fn audit_events(&self) -> Vec<AuditEventType> {
        self.audits
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.event_type)
            .collect()
    }

    pub fn verified_user_ids(&self) -> Vec<String> {
        self.verified_user_ids.lock().unwrap().clone()
    }

    pub fn touch_device(&self, id: &str, last_seen: DateTime<Utc>) {
        let mut devices = self.devices.write().unwrap();
        if let Some(device) = devices.iter_mut().find(|d| d.id == id) {
            device.last_seen = last_seen;
        }
    }
}

#[async_trait]
impl UserRepository for StubRepos {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        Ok(self.users.read().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> DomainResult<Option<User>> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_user_lookups.load(Ordering::SeqCst) {
            return Err(DomainError::StoreUnavailable("users store down".to_string()));
        }
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.phone == phone)
            .cloned())
    }

    async fn mark_verified(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.verified_user_ids.lock().unwrap().push(id.to_string());
        let mut users = self.users.write().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.is_verified = true;
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn list_phones(&self, offset: u64, limit: u64) -> DomainResult<Vec<String>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|u| u.phone.clone())
            .collect())
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.users.read().unwrap().len() as u64)
    }
}

#[async_trait]
impl VehicleRepository for StubRepos {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .unwrap()
            .iter()
            .find(|v| v.id == id)
            .cloned())
    }

    async fn find_by_reg_number(&self, reg_number: &str) -> DomainResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .unwrap()
            .iter()
            .find(|v| v.reg_number == reg_number)
            .cloned())
    }

    async fn find_by_chassis_number(&self, chassis_number: &str) -> DomainResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .unwrap()
            .iter()
            .find(|v| v.chassis_number == chassis_number)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> DomainResult<Vec<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .unwrap()
            .iter()
            .filter(|v| ids.contains(&v.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StationRepository for StubRepos {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Station>> {
        Ok(self
            .stations
            .read()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn find_in_bounding_box(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> DomainResult<Vec<Station>> {
        Ok(self
            .stations
            .read()
            .unwrap()
            .iter()
            .filter(|s| {
                s.latitude >= min_lat
                    && s.latitude <= max_lat
                    && s.longitude >= min_lng
                    && s.longitude <= max_lng
            })
            .cloned()
            .collect())
    }

    async fn list_page(&self, offset: u64, limit: u64) -> DomainResult<Vec<Station>> {
        Ok(self
            .stations
            .read()
            .unwrap()
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PairedDeviceRepository for StubRepos {
    async fn list_page(&self, query: PairedDeviceQuery) -> DomainResult<Vec<PairedDevice>> {
        let mut rows: Vec<PairedDevice> = self
            .devices
            .read()
            .unwrap()
            .iter()
            .filter(|d| d.user_id == query.user_id)
            .filter(|d| query.active.map_or(true, |a| d.is_active == a))
            .cloned()
            .collect();

        let sort_key = |d: &PairedDevice| match query.sort {
            ListSort::LastSeenDesc => d.last_seen,
            ListSort::ConnectedAtDesc => d.connected_at,
        };

        rows.sort_by(|a, b| {
            sort_key(b)
                .cmp(&sort_key(a))
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some(cursor) = &query.cursor {
            rows.retain(|d| {
                let key = sort_key(d);
                key < cursor.last_seen || (key == cursor.last_seen && d.id < cursor.id)
            });
        }

        rows.truncate(query.limit as usize);
        Ok(rows)
    }

    async fn find_by_user_and_vehicle(
        &self,
        user_id: &str,
        vehicle_id: &str,
    ) -> DomainResult<Option<PairedDevice>> {
        Ok(self
            .devices
            .read()
            .unwrap()
            .iter()
            .find(|d| d.user_id == user_id && d.vehicle_id == vehicle_id)
            .cloned())
    }

    async fn count_for_user(&self, user_id: &str, active_only: bool) -> DomainResult<u64> {
        Ok(self
            .devices
            .read()
            .unwrap()
            .iter()
            .filter(|d| d.user_id == user_id && (!active_only || d.is_active))
            .count() as u64)
    }
}

#[async_trait]
impl PairingStore for StubRepos {
    async fn execute_pairing(&self, command: PairingCommand) -> DomainResult<PairingOutcome> {
        if self.pairing_locked.load(Ordering::SeqCst) {
            return Err(DomainError::ResourceLocked(format!(
                "Pairing for chassis {} is already in progress",
                command.chassis_number
            )));
        }
        let n = self.pairings_executed.fetch_add(1, Ordering::SeqCst);
        Ok(PairingOutcome {
            vehicle_id: "veh-stub".to_string(),
            paired_device_id: format!("pd-stub-{n}"),
            created: n == 0,
            idempotent_replay: false,
            total_active: 1,
        })
    }
}

#[async_trait]
impl OtpAuditRepository for StubRepos {
    async fn insert(&self, entry: OtpAuditEntry) -> DomainResult<()> {
        self.audits.lock().unwrap().push(entry);
        Ok(())
    }
}

impl RepositoryProvider for StubRepos {
    fn users(&self) -> &dyn UserRepository {
        self
    }

    fn vehicles(&self) -> &dyn VehicleRepository {
        self
    }

    fn stations(&self) -> &dyn StationRepository {
        self
    }

    fn paired_devices(&self) -> &dyn PairedDeviceRepository {
        self
    }

    fn pairing(&self) -> &dyn PairingStore {
        self
    }

    fn otp_audit(&self) -> &dyn OtpAuditRepository {
        self
    }
}
