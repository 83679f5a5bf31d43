//! Phone existence filter service
//!
//! Wraps the Bloom filter with hot-store persistence: one opaque bit-array
//! blob plus a metadata record, reloaded on startup and rebuilt
//! periodically from the user table. Snapshot writers are serialized by a
//! single in-process mutex; the periodic refresh task is the only
//! repopulator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::filter::{BloomConfidence, BloomFilter};
use crate::domain::user::UserRepository;
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::kv::KvStore;

const FILTER_KEY: &str = "phone:bloom:filter";
const META_KEY: &str = "phone:bloom:meta";
const FALSE_POSITIVE_KEY: &str = "phone:bloom:false_positives";

/// Page size when rebuilding from the user table.
const POPULATE_PAGE: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct BloomConfig {
    pub expected_elements: u64,
    pub error_rate: f64,
    pub refresh_hours: i64,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            expected_elements: 10_000_000,
            error_rate: 0.001,
            refresh_hours: 24,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMeta {
    m_bits: u64,
    k_hashes: u32,
    inserted: u64,
    expected_elements: u64,
    error_rate: f64,
    last_refresh: DateTime<Utc>,
}

/// Outcome of a filter membership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomCheck {
    pub exists: bool,
    pub confidence: BloomConfidence,
}

pub struct PhoneExistenceFilter {
    kv: Arc<dyn KvStore>,
    config: BloomConfig,
    state: RwLock<Option<BloomFilter>>,
    /// Single-writer guard for populate/save; snapshot writes must never
    /// interleave.
    writer: Mutex<()>,
    false_positives: AtomicU64,
}

impl PhoneExistenceFilter {
    pub fn new(kv: Arc<dyn KvStore>, config: BloomConfig) -> Self {
        Self {
            kv,
            config,
            state: RwLock::new(None),
            writer: Mutex::new(()),
            false_positives: AtomicU64::new(0),
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Membership check. An uninitialized filter answers `maybe` so
    /// callers fall through to the authoritative store.
    pub async fn check(&self, phone: &str) -> BloomCheck {
        let state = self.state.read().await;
        match state.as_ref() {
            Some(filter) => {
                let confidence = filter.check(phone);
                BloomCheck {
                    exists: confidence == BloomConfidence::Maybe,
                    confidence,
                }
            }
            None => BloomCheck {
                exists: true,
                confidence: BloomConfidence::Maybe,
            },
        }
    }

    /// Add one phone. A no-op until the filter is initialized; the next
    /// rebuild will pick the phone up from the user table.
    pub async fn add(&self, phone: &str) {
        let mut state = self.state.write().await;
        if let Some(filter) = state.as_mut() {
            filter.add(phone);
        }
    }

    pub async fn add_bulk(&self, phones: &[String]) {
        let mut state = self.state.write().await;
        if let Some(filter) = state.as_mut() {
            filter.add_bulk(phones.iter().map(String::as_str));
        }
    }

    /// Count a database miss after a `maybe` answer.
    pub async fn record_false_positive(&self) {
        self.false_positives.fetch_add(1, Ordering::Relaxed);
        counter!("phone_bloom_false_positives_total").increment(1);
        if let Err(err) = self.kv.incr(FALSE_POSITIVE_KEY).await {
            warn!(error = %err, "Failed to persist bloom false-positive counter");
        }
    }

    pub fn false_positives(&self) -> u64 {
        self.false_positives.load(Ordering::Relaxed)
    }

    /// Load the persisted snapshot. Returns whether one was found; with no
    /// snapshot the filter stays uninitialized and callers fall through to
    /// the database tier.
    pub async fn load_snapshot(&self) -> DomainResult<bool> {
        let Some(meta_json) = self.kv.get(META_KEY).await? else {
            info!("No bloom snapshot found; filter marked uninitialized");
            return Ok(false);
        };
        let Some(bits) = self.kv.get(FILTER_KEY).await? else {
            warn!("Bloom metadata present but bit array missing; ignoring snapshot");
            return Ok(false);
        };

        let meta: SnapshotMeta = serde_json::from_str(&meta_json)
            .map_err(|e| DomainError::Internal(format!("Corrupt bloom metadata: {e}")))?;

        let Some(filter) =
            BloomFilter::from_snapshot(&bits, meta.m_bits, meta.k_hashes, meta.inserted)
        else {
            warn!("Bloom snapshot geometry mismatch; ignoring snapshot");
            return Ok(false);
        };

        let age_hours = (Utc::now() - meta.last_refresh).num_hours();
        if age_hours > self.config.refresh_hours {
            warn!(
                age_hours,
                refresh_hours = self.config.refresh_hours,
                "Bloom snapshot is stale; serving it anyway until the next refresh"
            );
        }

        info!(
            inserted = meta.inserted,
            m_bits = meta.m_bits,
            "Bloom snapshot loaded"
        );
        *self.state.write().await = Some(filter);
        Ok(true)
    }

    /// Persist the current filter. Serialized by the writer mutex.
    pub async fn save_snapshot(&self) -> DomainResult<()> {
        let _writer = self.writer.lock().await;

        let state = self.state.read().await;
        let Some(filter) = state.as_ref() else {
            return Err(DomainError::Internal(
                "Cannot snapshot an uninitialized bloom filter".to_string(),
            ));
        };

        let meta = SnapshotMeta {
            m_bits: filter.m_bits(),
            k_hashes: filter.k_hashes(),
            inserted: filter.inserted(),
            expected_elements: self.config.expected_elements,
            error_rate: self.config.error_rate,
            last_refresh: Utc::now(),
        };
        let bits = filter.snapshot_bits();
        drop(state);

        self.kv.set(FILTER_KEY, &bits).await?;
        let meta_json = serde_json::to_string(&meta)
            .map_err(|e| DomainError::Internal(format!("Bloom metadata encoding: {e}")))?;
        self.kv.set(META_KEY, &meta_json).await?;

        info!(inserted = meta.inserted, "Bloom snapshot saved");
        Ok(())
    }

    /// Rebuild the filter from the user table and persist the result.
    /// Returns the number of phones loaded.
    pub async fn populate_from_users(&self, users: &dyn UserRepository) -> DomainResult<u64> {
        let _writer = self.writer.lock().await;

        let mut fresh =
            BloomFilter::with_capacity(self.config.expected_elements, self.config.error_rate);
        let mut offset = 0u64;
        let mut total = 0u64;

        loop {
            let page = users.list_phones(offset, POPULATE_PAGE).await?;
            if page.is_empty() {
                break;
            }
            total += page.len() as u64;
            offset += page.len() as u64;
            fresh.add_bulk(page.iter().map(String::as_str));
        }

        *self.state.write().await = Some(fresh);
        drop(_writer);

        self.save_snapshot().await?;
        info!(total, "Bloom filter repopulated from user table");
        Ok(total)
    }
}
