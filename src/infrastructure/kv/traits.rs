//! Key/value store trait definitions
//!
//! A Redis-shaped surface over whatever hot store backs the deployment.
//! Cache callers must treat writes as best-effort and reads as optional;
//! only the OTP/session records rely on the store being up, and those
//! paths surface `KvError` to the caller.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::shared::types::errors::{DomainError, InfraError};

#[derive(Debug, Error)]
pub enum KvError {
    #[error("KV store unavailable: {0}")]
    Unavailable(String),
}

pub type KvResult<T> = Result<T, KvError>;

impl From<KvError> for DomainError {
    fn from(err: KvError) -> Self {
        DomainError::StoreUnavailable(err.to_string())
    }
}

impl From<KvError> for InfraError {
    fn from(err: KvError) -> Self {
        InfraError::Kv(err.to_string())
    }
}

/// One member of a geo set.
#[derive(Debug, Clone)]
pub struct GeoEntry {
    pub member: String,
    pub lat: f64,
    pub lng: f64,
}

/// A radius-search hit, ordered by ascending distance.
#[derive(Debug, Clone)]
pub struct GeoHit {
    pub member: String,
    pub distance_km: f64,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    // String operations
    async fn get(&self, key: &str) -> KvResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> KvResult<()>;
    async fn setex(&self, key: &str, ttl: Duration, value: &str) -> KvResult<()>;
    async fn del(&self, key: &str) -> KvResult<bool>;
    async fn exists(&self, key: &str) -> KvResult<bool>;
    async fn incr(&self, key: &str) -> KvResult<i64>;
    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool>;
    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>>;
    /// Batch read preserving input order.
    async fn mget(&self, keys: &[String]) -> KvResult<Vec<Option<String>>>;
    /// Glob scan. Administrative use only, never on a request hot path.
    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>>;

    // Hash operations
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> KvResult<()>;
    async fn hgetall(&self, key: &str) -> KvResult<HashMap<String, String>>;

    // Sorted-set operations
    async fn zadd(&self, key: &str, score: f64, member: &str) -> KvResult<()>;
    async fn zrem(&self, key: &str, member: &str) -> KvResult<bool>;
    async fn zcard(&self, key: &str) -> KvResult<u64>;
    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> KvResult<Vec<(String, f64)>>;

    // Geo operations (distances in km)
    async fn geo_add(&self, key: &str, entries: &[GeoEntry]) -> KvResult<()>;
    async fn geo_remove(&self, key: &str, member: &str) -> KvResult<bool>;
    async fn geo_radius(
        &self,
        key: &str,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: usize,
    ) -> KvResult<Vec<GeoHit>>;

    /// Liveness probe for health reporting.
    async fn ping(&self) -> KvResult<()>;
}
