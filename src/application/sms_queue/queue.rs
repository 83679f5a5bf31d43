//! Durable SMS job queue over the hot store
//!
//! Jobs live as JSON payloads keyed by id, scheduled in a sorted set
//! scored by ready-at time (epoch millis). Claiming is `zrem`-wins: the
//! worker whose removal returns true owns the job, so concurrent workers
//! never double-send. Completed jobs are dropped immediately; terminal
//! failures are parked under a failed key for a day of post-mortem.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::kv::{KvResult, KvStore};

const READY_KEY: &str = "sms:jobs";
const FAILED_KEY: &str = "sms:failed";

fn payload_key(id: &str) -> String {
    format!("sms:job:{id}")
}

#[derive(Debug, Clone)]
pub struct SmsQueueConfig {
    /// Queue-level attempts (the provider keeps its own short retry).
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Hard per-job processing timeout.
    pub job_timeout: Duration,
    /// How long terminally failed payloads are retained.
    pub failed_retention: Duration,
    /// Worker poll interval when the queue is empty.
    pub poll_interval: Duration,
    /// Optional queue-level limiter: max jobs per window.
    pub limiter: Option<(i64, Duration)>,
}

impl Default for SmsQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(2000),
            job_timeout: Duration::from_secs(30),
            failed_retention: Duration::from_secs(86400),
            poll_interval: Duration::from_millis(500),
            limiter: None,
        }
    }
}

/// One OTP dispatch task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsJob {
    pub id: String,
    pub phone: String,
    pub otp: String,
    pub request_id: String,
    pub ip: Option<String>,
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
}

pub struct SmsQueue {
    kv: Arc<dyn KvStore>,
    config: SmsQueueConfig,
}

impl SmsQueue {
    pub fn new(kv: Arc<dyn KvStore>, config: SmsQueueConfig) -> Self {
        Self { kv, config }
    }

    pub fn config(&self) -> &SmsQueueConfig {
        &self.config
    }

    /// Enqueue a dispatch task, ready immediately.
    pub async fn enqueue(
        &self,
        phone: &str,
        otp: &str,
        request_id: &str,
        ip: Option<String>,
    ) -> DomainResult<String> {
        let job = SmsJob {
            id: uuid::Uuid::new_v4().to_string(),
            phone: phone.to_string(),
            otp: otp.to_string(),
            request_id: request_id.to_string(),
            ip,
            attempts_made: 0,
            enqueued_at: Utc::now(),
        };

        self.store_payload(&job).await?;
        self.kv
            .zadd(READY_KEY, Utc::now().timestamp_millis() as f64, &job.id)
            .await
            .map_err(DomainError::from)?;

        metrics::counter!("sms_jobs_enqueued_total").increment(1);
        Ok(job.id)
    }

    async fn store_payload(&self, job: &SmsJob) -> DomainResult<()> {
        let json = serde_json::to_string(job)
            .map_err(|e| DomainError::Internal(format!("SMS job encoding: {e}")))?;
        self.kv
            .set(&payload_key(&job.id), &json)
            .await
            .map_err(DomainError::from)
    }

    /// Claim the next ready job, if any. `zrem`-wins arbitration.
    pub async fn claim_ready(&self) -> KvResult<Option<SmsJob>> {
        let now_ms = Utc::now().timestamp_millis() as f64;
        let candidates = self.kv.zrange_by_score(READY_KEY, 0.0, now_ms, 8).await?;

        for (job_id, _) in candidates {
            if !self.kv.zrem(READY_KEY, &job_id).await? {
                // Another worker won this job.
                continue;
            }
            match self.kv.get(&payload_key(&job_id)).await? {
                Some(raw) => match serde_json::from_str::<SmsJob>(&raw) {
                    Ok(job) => return Ok(Some(job)),
                    Err(err) => {
                        warn!(job_id, error = %err, "Dropping corrupt SMS job payload");
                        self.kv.del(&payload_key(&job_id)).await?;
                    }
                },
                None => {
                    warn!(job_id, "SMS job scheduled without payload; dropping");
                }
            }
        }
        Ok(None)
    }

    /// Drop a completed job.
    pub async fn complete(&self, job: &SmsJob) -> KvResult<()> {
        self.kv.del(&payload_key(&job.id)).await?;
        metrics::counter!("sms_jobs_completed_total").increment(1);
        Ok(())
    }

    /// Re-schedule after a failure with exponential backoff, or park the
    /// job as terminally failed once attempts are exhausted. Returns the
    /// updated job and whether it was terminal.
    pub async fn retry_or_fail(&self, mut job: SmsJob) -> KvResult<(SmsJob, bool)> {
        job.attempts_made += 1;

        if job.attempts_made >= self.config.max_attempts {
            let key = payload_key(&job.id);
            if let Ok(json) = serde_json::to_string(&job) {
                self.kv
                    .setex(&key, self.config.failed_retention, &json)
                    .await?;
            }
            self.kv
                .zadd(FAILED_KEY, Utc::now().timestamp_millis() as f64, &job.id)
                .await?;
            metrics::counter!("sms_jobs_failed_total").increment(1);
            return Ok((job, true));
        }

        let backoff = self.config.backoff_base.as_millis() as u64
            * 2u64.saturating_pow(job.attempts_made - 1);
        let ready_at = Utc::now().timestamp_millis() + backoff as i64;

        self.store_payload(&job)
            .await
            .map_err(|e| crate::infrastructure::kv::KvError::Unavailable(e.to_string()))?;
        self.kv.zadd(READY_KEY, ready_at as f64, &job.id).await?;
        metrics::counter!("sms_jobs_retried_total").increment(1);
        Ok((job, false))
    }

    /// Jobs currently scheduled (ready or delayed).
    pub async fn depth(&self) -> KvResult<u64> {
        self.kv.zcard(READY_KEY).await
    }

    /// Queue-level limiter check; true when dispatch may proceed.
    pub async fn limiter_allows(&self) -> bool {
        let Some((max_jobs, window)) = self.config.limiter else {
            return true;
        };
        match self.kv.incr("sms:queue:rate").await {
            Ok(1) => {
                let _ = self.kv.expire("sms:queue:rate", window).await;
                true
            }
            Ok(count) => count <= max_jobs,
            Err(err) => {
                warn!(error = %err, "Queue limiter store failure, allowing dispatch");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kv::MemoryKv;

    fn queue() -> SmsQueue {
        SmsQueue::new(
            Arc::new(MemoryKv::new()),
            SmsQueueConfig {
                backoff_base: Duration::from_millis(50),
                max_attempts: 3,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn enqueue_then_claim() {
        let q = queue();
        let id = q
            .enqueue("+919876543210", "123456", "req-1", Some("1.2.3.4".into()))
            .await
            .unwrap();

        let job = q.claim_ready().await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.phone, "+919876543210");
        assert_eq!(job.attempts_made, 0);

        // Claimed job is no longer schedulable.
        assert!(q.claim_ready().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_delays_next_claim() {
        let q = queue();
        q.enqueue("+919876543210", "123456", "req-1", None)
            .await
            .unwrap();
        let job = q.claim_ready().await.unwrap().unwrap();

        let (job, terminal) = q.retry_or_fail(job).await.unwrap();
        assert!(!terminal);
        assert_eq!(job.attempts_made, 1);

        // Backoff has not elapsed yet.
        assert!(q.claim_ready().await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let retried = q.claim_ready().await.unwrap().unwrap();
        assert_eq!(retried.attempts_made, 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_park_job_as_failed() {
        let q = queue();
        q.enqueue("+919876543210", "123456", "req-1", None)
            .await
            .unwrap();
        let mut job = q.claim_ready().await.unwrap().unwrap();

        job.attempts_made = 2; // next failure is the third attempt
        let (failed, terminal) = q.retry_or_fail(job).await.unwrap();
        assert!(terminal);
        assert_eq!(failed.attempts_made, 3);
        assert!(q.claim_ready().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completed_jobs_are_dropped() {
        let q = queue();
        q.enqueue("+919876543210", "123456", "req-1", None)
            .await
            .unwrap();
        let job = q.claim_ready().await.unwrap().unwrap();
        q.complete(&job).await.unwrap();
        assert_eq!(q.depth().await.unwrap(), 0);
    }
}
