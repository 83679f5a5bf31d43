//! Pairing repository interfaces

use async_trait::async_trait;

use super::model::{PairedDevice, PairingCommand, PairingOutcome};
use crate::domain::DomainResult;
use crate::shared::types::pagination::Cursor;

/// Sort orders supported by the paired-device listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListSort {
    #[default]
    LastSeenDesc,
    ConnectedAtDesc,
}

impl ListSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "last_seen_desc" => Some(Self::LastSeenDesc),
            "connected_at_desc" => Some(Self::ConnectedAtDesc),
            _ => None,
        }
    }
}

/// Keyset query for one page of paired devices.
#[derive(Debug, Clone)]
pub struct PairedDeviceQuery {
    pub user_id: String,
    /// `Some(true)` restricts to active pairings; `None` returns all.
    pub active: Option<bool>,
    pub sort: ListSort,
    pub cursor: Option<Cursor>,
    /// Rows to fetch; callers pass `limit + 1` to detect further pages.
    pub limit: u64,
}

#[async_trait]
pub trait PairedDeviceRepository: Send + Sync {
    async fn list_page(&self, query: PairedDeviceQuery) -> DomainResult<Vec<PairedDevice>>;
    async fn count_for_user(&self, user_id: &str, active_only: bool) -> DomainResult<u64>;
    /// Pairing row for a specific vehicle, for out-of-window expansion.
    async fn find_by_user_and_vehicle(
        &self,
        user_id: &str,
        vehicle_id: &str,
    ) -> DomainResult<Option<PairedDevice>>;
}

/// Transactional pairing executor.
///
/// The whole §pairing flow (advisory lock, idempotency lookup, vehicle
/// upsert, paired-device upsert, active count) runs inside one relational
/// transaction behind this seam.
#[async_trait]
pub trait PairingStore: Send + Sync {
    async fn execute_pairing(&self, command: PairingCommand) -> DomainResult<PairingOutcome>;
}
