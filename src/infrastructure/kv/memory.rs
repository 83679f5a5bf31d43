//! In-process key/value store implementation
//!
//! Single-node store for development and testing. Expiry is lazy: an
//! expired entry is dropped on first access. Production deployments plug a
//! Redis-backed implementation behind the same trait.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{GeoEntry, GeoHit, KvError, KvResult, KvStore};
use crate::domain::station::{haversine_km, Coordinates};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Zset(HashMap<String, f64>),
    Geo(HashMap<String, (f64, f64)>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// In-memory KV store for development and testing
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Read a live entry, dropping it when expired.
    fn read(&self, key: &str) -> Option<Entry> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.live() => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn write(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    /// Remaining TTL of a live entry, for writes that must not clobber it.
    fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        self.read(key).and_then(|e| {
            e.expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))
        })
    }
}

fn glob_match(pattern: &str, key: &str) -> bool {
    // Supports '*' wildcards only, which is all the admin surface needs.
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => {
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
    }
    parts.last().map_or(true, |last| {
        last.is_empty() || key.ends_with(last)
    })
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.read(key).and_then(|e| match e.value {
            Value::Str(s) => Some(s),
            _ => None,
        }))
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.write(key, Value::Str(value.to_string()), None);
        Ok(())
    }

    async fn setex(&self, key: &str, ttl: Duration, value: &str) -> KvResult<()> {
        self.write(key, Value::Str(value.to_string()), Some(ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        Ok(self.read(key).is_some())
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        // Entry-level lock keeps concurrent increments exact.
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: Value::Str("0".to_string()),
                expires_at: None,
            });
        if !slot.live() {
            *slot = Entry {
                value: Value::Str("0".to_string()),
                expires_at: None,
            };
        }
        let next = match &slot.value {
            Value::Str(s) => s
                .parse::<i64>()
                .map_err(|_| KvError::Unavailable(format!("key {key} holds a non-integer")))?
                + 1,
            _ => return Err(KvError::Unavailable(format!("key {key} holds a non-string"))),
        };
        slot.value = Value::Str(next.to_string());
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.live() => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
        Ok(self.read(key).and_then(|e| {
            e.expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))
        }))
    }

    async fn mget(&self, keys: &[String]) -> KvResult<Vec<Option<String>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.live() && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> KvResult<()> {
        let mut hash = match self.read(key) {
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => h,
            _ => HashMap::new(),
        };
        let ttl = self.remaining_ttl(key);
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        self.write(key, Value::Hash(hash), ttl);
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> KvResult<HashMap<String, String>> {
        Ok(match self.read(key) {
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => h,
            _ => HashMap::new(),
        })
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> KvResult<()> {
        let mut set = match self.read(key) {
            Some(Entry {
                value: Value::Zset(z),
                ..
            }) => z,
            _ => HashMap::new(),
        };
        set.insert(member.to_string(), score);
        let ttl = self.remaining_ttl(key);
        self.write(key, Value::Zset(set), ttl);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> KvResult<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.live() => match &mut entry.value {
                Value::Zset(z) => Ok(z.remove(member).is_some()),
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }

    async fn zcard(&self, key: &str) -> KvResult<u64> {
        Ok(match self.read(key) {
            Some(Entry {
                value: Value::Zset(z),
                ..
            }) => z.len() as u64,
            _ => 0,
        })
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> KvResult<Vec<(String, f64)>> {
        let mut hits: Vec<(String, f64)> = match self.read(key) {
            Some(Entry {
                value: Value::Zset(z),
                ..
            }) => z
                .into_iter()
                .filter(|(_, score)| *score >= min && *score <= max)
                .collect(),
            _ => Vec::new(),
        };
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn geo_add(&self, key: &str, entries: &[GeoEntry]) -> KvResult<()> {
        let mut geo = match self.read(key) {
            Some(Entry {
                value: Value::Geo(g),
                ..
            }) => g,
            _ => HashMap::new(),
        };
        for entry in entries {
            geo.insert(entry.member.clone(), (entry.lat, entry.lng));
        }
        let ttl = self.remaining_ttl(key);
        self.write(key, Value::Geo(geo), ttl);
        Ok(())
    }

    async fn geo_remove(&self, key: &str, member: &str) -> KvResult<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.live() => match &mut entry.value {
                Value::Geo(g) => Ok(g.remove(member).is_some()),
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }

    async fn geo_radius(
        &self,
        key: &str,
        lat: f64,
        lng: f64,
        radius_km: f64,
        limit: usize,
    ) -> KvResult<Vec<GeoHit>> {
        let center = Coordinates::new(lat, lng);
        let mut hits: Vec<GeoHit> = match self.read(key) {
            Some(Entry {
                value: Value::Geo(g),
                ..
            }) => g
                .into_iter()
                .filter_map(|(member, (mlat, mlng))| {
                    let distance_km = haversine_km(center, Coordinates::new(mlat, mlng));
                    (distance_km <= radius_km).then_some(GeoHit {
                        member,
                        distance_km,
                    })
                })
                .collect(),
            _ => Vec::new(),
        };
        hits.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.member.cmp(&b.member))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}
