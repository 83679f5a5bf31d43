//! Three-tier phone existence check
//!
//! Tier order is fixed: hot cache → bloom filter → relational store. A
//! relational outage fails open to "exists" for availability; that cannot
//! enable enumeration because the OTP request flow still never dispatches
//! to unregistered numbers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::bloom::{BloomConfidence, PhoneExistenceFilter};
use crate::domain::user::{User, UserSummary};
use crate::domain::RepositoryProvider;
use crate::infrastructure::kv::KvStore;

#[derive(Debug, Clone)]
pub struct PhoneCacheConfig {
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
}

impl Default for PhoneCacheConfig {
    fn default() -> Self {
        Self {
            positive_ttl: Duration::from_secs(86400),
            negative_ttl: Duration::from_secs(300),
        }
    }
}

/// Which tier answered the existence question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistenceSource {
    Cache,
    Bloom,
    Database,
    ErrorFailopen,
}

/// Existence answer with provenance and timing.
#[derive(Debug, Clone)]
pub struct PhoneExistence {
    pub exists: bool,
    pub user: Option<UserSummary>,
    pub source: ExistenceSource,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserSummary>,
    cached_at: DateTime<Utc>,
}

fn cache_key(phone: &str) -> String {
    format!("user:phone:{phone}")
}

pub struct PhoneVerificationCache {
    kv: Arc<dyn KvStore>,
    bloom: Arc<PhoneExistenceFilter>,
    repos: Arc<dyn RepositoryProvider>,
    config: PhoneCacheConfig,
}

impl PhoneVerificationCache {
    pub fn new(
        kv: Arc<dyn KvStore>,
        bloom: Arc<PhoneExistenceFilter>,
        repos: Arc<dyn RepositoryProvider>,
        config: PhoneCacheConfig,
    ) -> Self {
        Self {
            kv,
            bloom,
            repos,
            config,
        }
    }

    /// Resolve whether `phone` belongs to a registered user.
    pub async fn check_phone_exists(&self, phone: &str) -> PhoneExistence {
        let started = Instant::now();

        // Tier 1: hot cache. Reads are optional; any failure falls through.
        match self.kv.get(&cache_key(phone)).await {
            Ok(Some(raw)) => {
                if let Ok(entry) = serde_json::from_str::<CacheEntry>(&raw) {
                    counter!("phone_exists_cache_hits_total").increment(1);
                    return PhoneExistence {
                        exists: entry.exists,
                        user: entry.user,
                        source: ExistenceSource::Cache,
                        duration_ms: elapsed_ms(started),
                    };
                }
                warn!(phone, "Corrupt phone-cache entry, falling through");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(phone, error = %err, "Phone-cache read failed, falling through");
            }
        }

        // Tier 2: bloom filter. A definite-no is authoritative.
        let bloom = self.bloom.check(phone).await;
        if bloom.confidence == BloomConfidence::DefinitelyNot {
            self.cache_negative(phone).await;
            return PhoneExistence {
                exists: false,
                user: None,
                source: ExistenceSource::Bloom,
                duration_ms: elapsed_ms(started),
            };
        }

        // Tier 3: relational store, the authority.
        match self.repos.users().find_by_phone(phone).await {
            Ok(Some(user)) => {
                let summary = UserSummary::from(&user);
                self.cache_positive(phone, &summary).await;
                self.bloom.add(phone).await;
                PhoneExistence {
                    exists: true,
                    user: Some(summary),
                    source: ExistenceSource::Database,
                    duration_ms: elapsed_ms(started),
                }
            }
            Ok(None) => {
                // The filter said maybe and the authority disagreed.
                if self.bloom.is_initialized().await {
                    self.bloom.record_false_positive().await;
                }
                self.cache_negative(phone).await;
                PhoneExistence {
                    exists: false,
                    user: None,
                    source: ExistenceSource::Database,
                    duration_ms: elapsed_ms(started),
                }
            }
            Err(err) => {
                counter!("phone_exists_failopen_total").increment(1);
                warn!(phone, error = %err, "Existence check store failure, failing open");
                PhoneExistence {
                    exists: true,
                    user: None,
                    source: ExistenceSource::ErrorFailopen,
                    duration_ms: elapsed_ms(started),
                }
            }
        }
    }

    /// Prime the caches for a newly created user.
    pub async fn add_phone(&self, phone: &str, user: &User) {
        self.cache_positive(phone, &UserSummary::from(user)).await;
        self.bloom.add(phone).await;
    }

    async fn cache_positive(&self, phone: &str, user: &UserSummary) {
        let entry = CacheEntry {
            exists: true,
            user: Some(user.clone()),
            cached_at: Utc::now(),
        };
        self.write_entry(phone, &entry, self.config.positive_ttl)
            .await;
    }

    async fn cache_negative(&self, phone: &str) {
        let entry = CacheEntry {
            exists: false,
            user: None,
            cached_at: Utc::now(),
        };
        self.write_entry(phone, &entry, self.config.negative_ttl)
            .await;
    }

    async fn write_entry(&self, phone: &str, entry: &CacheEntry, ttl: Duration) {
        let Ok(json) = serde_json::to_string(entry) else {
            return;
        };
        if let Err(err) = self.kv.setex(&cache_key(phone), ttl, &json).await {
            warn!(phone, error = %err, "Phone-cache write failed (best effort)");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
