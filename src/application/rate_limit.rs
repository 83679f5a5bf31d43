//! Keyed counter rate limiting over the hot store
//!
//! Counters use `incr` + first-write-wins `expire`, so a duplicate apply
//! only re-extends the TTL. The limiter fails open: when the store is
//! unreachable requests pass with the reason recorded, because a total
//! auth outage is worse than briefly bypassed limits. The fail-open rule
//! is scoped to this primitive and the phone-existence check; OTP
//! verification itself never falls open.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::infrastructure::kv::KvStore;

/// One `(key, limit, window)` tuple of a compound check.
#[derive(Debug, Clone)]
pub struct LimitRule {
    pub key: String,
    pub limit: i64,
    pub window: Duration,
    /// Stable reason string surfaced in audits and 429 payloads.
    pub reason: &'static str,
}

/// Result of a single-counter check.
#[derive(Debug, Clone)]
pub struct RateCheck {
    pub allowed: bool,
    pub count: i64,
    pub ttl: Option<Duration>,
    /// Set when the decision did not come from the counter itself.
    pub reason: Option<&'static str>,
}

/// Result of a compound check.
#[derive(Debug, Clone)]
pub enum RateDecision {
    Allowed,
    /// Store unreachable; request passes with the bypass recorded.
    FailOpen,
    Limited {
        reason: &'static str,
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Limited { .. })
    }
}

pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Read-only check of one counter.
    pub async fn check(&self, key: &str, limit: i64, window: Duration) -> RateCheck {
        match self.kv.get(key).await {
            Ok(value) => {
                let count = value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
                if count >= limit {
                    let ttl = self.kv.ttl(key).await.ok().flatten();
                    RateCheck {
                        allowed: false,
                        count,
                        ttl: Some(ttl.unwrap_or(window)),
                        reason: None,
                    }
                } else {
                    RateCheck {
                        allowed: true,
                        count,
                        ttl: None,
                        reason: None,
                    }
                }
            }
            Err(err) => {
                counter!("rate_limit_fail_open_total").increment(1);
                warn!(key, error = %err, "Rate-limit store unavailable, failing open");
                RateCheck {
                    allowed: true,
                    count: 0,
                    ttl: None,
                    reason: Some("store_error"),
                }
            }
        }
    }

    /// Increment one counter, attaching the window TTL on first hit.
    pub async fn apply(&self, key: &str, window: Duration) {
        match self.kv.incr(key).await {
            Ok(1) => {
                if let Err(err) = self.kv.expire(key, window).await {
                    warn!(key, error = %err, "Failed to attach rate-limit TTL");
                }
            }
            Ok(_) => {}
            Err(err) => {
                counter!("rate_limit_fail_open_total").increment(1);
                warn!(key, error = %err, "Rate-limit apply skipped, store unavailable");
            }
        }
    }

    /// Check several counters in order; the first exceeded rule decides.
    pub async fn check_all(&self, rules: &[LimitRule]) -> RateDecision {
        let mut saw_store_error = false;

        for rule in rules {
            let check = self.check(&rule.key, rule.limit, rule.window).await;
            if !check.allowed {
                return RateDecision::Limited {
                    reason: rule.reason,
                    retry_after: check.ttl.unwrap_or(rule.window),
                };
            }
            if check.reason == Some("store_error") {
                saw_store_error = true;
            }
        }

        if saw_store_error {
            RateDecision::FailOpen
        } else {
            RateDecision::Allowed
        }
    }

    /// Apply every counter of a compound rule set.
    pub async fn apply_all(&self, rules: &[LimitRule]) {
        for rule in rules {
            self.apply(&rule.key, rule.window).await;
        }
    }

    /// Existence-style cooldown check. Fails open to "not cooling down".
    pub async fn in_cooldown(&self, key: &str) -> Option<Duration> {
        match self.kv.exists(key).await {
            Ok(true) => {
                let ttl = self.kv.ttl(key).await.ok().flatten();
                Some(ttl.unwrap_or(Duration::ZERO))
            }
            Ok(false) => None,
            Err(err) => {
                counter!("rate_limit_fail_open_total").increment(1);
                warn!(key, error = %err, "Cooldown store unavailable, failing open");
                None
            }
        }
    }

    /// Arm a cooldown key. Idempotent: re-arming only re-extends the TTL.
    pub async fn set_cooldown(&self, key: &str, duration: Duration) {
        if let Err(err) = self.kv.setex(key, duration, "1").await {
            warn!(key, error = %err, "Failed to arm cooldown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kv::{GeoEntry, GeoHit, KvError, KvResult, MemoryKv};
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn counter_limits_after_threshold() {
        let rl = limiter();
        let window = Duration::from_secs(60);

        rl.apply("otp:rate:hour:+911", window).await;
        rl.apply("otp:rate:hour:+911", window).await;

        let check = rl.check("otp:rate:hour:+911", 2, window).await;
        assert!(!check.allowed);
        assert_eq!(check.count, 2);
        assert!(check.ttl.is_some());

        let under = rl.check("otp:rate:hour:+911", 3, window).await;
        assert!(under.allowed);
    }

    #[tokio::test]
    async fn compound_check_returns_first_exceeded_reason() {
        let rl = limiter();
        let rules = vec![
            LimitRule {
                key: "otp:rate:hour:+911".to_string(),
                limit: 10,
                window: Duration::from_secs(3600),
                reason: "hourly_limit",
            },
            LimitRule {
                key: "otp:rate:day:+911".to_string(),
                limit: 1,
                window: Duration::from_secs(86400),
                reason: "daily_limit",
            },
        ];

        rl.apply_all(&rules).await;
        match rl.check_all(&rules).await {
            RateDecision::Limited { reason, .. } => assert_eq!(reason, "daily_limit"),
            other => panic!("expected limited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cooldown_round_trip() {
        let rl = limiter();
        assert!(rl.in_cooldown("otp:cooldown:+911").await.is_none());
        rl.set_cooldown("otp:cooldown:+911", Duration::from_secs(60)).await;
        assert!(rl.in_cooldown("otp:cooldown:+911").await.is_some());
    }

    #[tokio::test]
    async fn duplicate_apply_keeps_window() {
        let rl = limiter();
        let window = Duration::from_secs(60);
        rl.apply("k", window).await;
        rl.apply("k", window).await;
        let check = rl.check("k", 1, window).await;
        assert!(!check.allowed);
        assert_eq!(check.count, 2);
    }

    /// A store that is always down.
    struct DownKv;

    #[async_trait]
    impl crate::infrastructure::kv::KvStore for DownKv {
        async fn get(&self, _: &str) -> KvResult<Option<String>> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn set(&self, _: &str, _: &str) -> KvResult<()> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn setex(&self, _: &str, _: Duration, _: &str) -> KvResult<()> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn del(&self, _: &str) -> KvResult<bool> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn exists(&self, _: &str) -> KvResult<bool> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn incr(&self, _: &str) -> KvResult<i64> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn expire(&self, _: &str, _: Duration) -> KvResult<bool> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn ttl(&self, _: &str) -> KvResult<Option<Duration>> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn mget(&self, _: &[String]) -> KvResult<Vec<Option<String>>> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn keys(&self, _: &str) -> KvResult<Vec<String>> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn hset(&self, _: &str, _: &[(String, String)]) -> KvResult<()> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn hgetall(&self, _: &str) -> KvResult<HashMap<String, String>> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn zadd(&self, _: &str, _: f64, _: &str) -> KvResult<()> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn zrem(&self, _: &str, _: &str) -> KvResult<bool> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn zcard(&self, _: &str) -> KvResult<u64> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn zrange_by_score(
            &self,
            _: &str,
            _: f64,
            _: f64,
            _: usize,
        ) -> KvResult<Vec<(String, f64)>> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn geo_add(&self, _: &str, _: &[GeoEntry]) -> KvResult<()> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn geo_remove(&self, _: &str, _: &str) -> KvResult<bool> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn geo_radius(
            &self,
            _: &str,
            _: f64,
            _: f64,
            _: f64,
            _: usize,
        ) -> KvResult<Vec<GeoHit>> {
            Err(KvError::Unavailable("down".into()))
        }
        async fn ping(&self) -> KvResult<()> {
            Err(KvError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn store_outage_fails_open() {
        let rl = RateLimiter::new(Arc::new(DownKv));

        let check = rl.check("any", 1, Duration::from_secs(60)).await;
        assert!(check.allowed);
        assert_eq!(check.reason, Some("store_error"));

        let decision = rl
            .check_all(&[LimitRule {
                key: "any".to_string(),
                limit: 1,
                window: Duration::from_secs(60),
                reason: "hourly_limit",
            }])
            .await;
        assert!(matches!(decision, RateDecision::FailOpen));
        assert!(decision.is_allowed());

        assert!(rl.in_cooldown("any").await.is_none());
    }
}
