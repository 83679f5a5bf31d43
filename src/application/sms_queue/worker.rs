//! SMS queue worker
//!
//! Stateless consumers of the dispatch queue. Each worker process runs N
//! concurrent handler loops; horizontal scale is just more processes over
//! the same store. On shutdown a loop stops claiming and lets its
//! in-flight job finish.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::queue::{SmsJob, SmsQueue};
use crate::application::audit::AuditLogger;
use crate::domain::otp::{AuditEventType, OtpAuditEntry};
use crate::infrastructure::sms::SmsProvider;
use crate::shared::shutdown::Shutdown;

pub struct SmsWorker {
    queue: Arc<SmsQueue>,
    provider: Arc<dyn SmsProvider>,
    audit: Arc<AuditLogger>,
    worker_id: String,
    concurrency: usize,
}

impl SmsWorker {
    pub fn new(
        queue: Arc<SmsQueue>,
        provider: Arc<dyn SmsProvider>,
        audit: Arc<AuditLogger>,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            provider,
            audit,
            worker_id: format!("sms-worker-{}", uuid::Uuid::new_v4()),
            concurrency: concurrency.max(1),
        }
    }

    /// Spawn the handler loops. Join the handles to drain on shutdown.
    pub fn start(self: Arc<Self>, shutdown: Shutdown) -> Vec<JoinHandle<()>> {
        info!(
            worker_id = %self.worker_id,
            concurrency = self.concurrency,
            "Starting SMS queue worker"
        );

        (0..self.concurrency)
            .map(|slot| {
                let worker = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    worker.run_loop(slot, shutdown).await;
                })
            })
            .collect()
    }

    async fn run_loop(&self, slot: usize, shutdown: Shutdown) {
        let poll = self.queue.config().poll_interval;

        while !shutdown.is_stopping() {
            if !self.queue.limiter_allows().await {
                tokio::time::sleep(poll).await;
                continue;
            }

            match self.queue.claim_ready().await {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => {
                    // Idle; wake early if shutdown fires.
                    tokio::select! {
                        _ = tokio::time::sleep(poll) => {}
                        _ = shutdown.wait() => {}
                    }
                }
                Err(err) => {
                    warn!(slot, error = %err, "SMS queue claim failed; backing off");
                    tokio::time::sleep(poll).await;
                }
            }
        }

        info!(worker_id = %self.worker_id, slot, "SMS worker loop stopped");
    }

    async fn process(&self, job: SmsJob) {
        let timeout = self.queue.config().job_timeout;
        let outcome =
            tokio::time::timeout(timeout, self.provider.send(&job.phone, &job.otp)).await;

        match outcome {
            Ok(Ok(delivery)) => {
                info!(
                    job_id = %job.id,
                    request_id = %job.request_id,
                    provider = self.provider.name(),
                    message_id = %delivery.message_id,
                    duration_ms = delivery.duration_ms,
                    "OTP SMS delivered"
                );
                if let Err(err) = self.queue.complete(&job).await {
                    warn!(job_id = %job.id, error = %err, "Failed to drop completed SMS job");
                }
            }
            Ok(Err(err)) => {
                self.handle_failure(job, err.to_string()).await;
            }
            Err(_) => {
                self.handle_failure(job, format!("job timed out after {timeout:?}")).await;
            }
        }
    }

    async fn handle_failure(&self, job: SmsJob, reason: String) {
        warn!(
            job_id = %job.id,
            attempts_made = job.attempts_made,
            reason = %reason,
            "SMS dispatch attempt failed"
        );

        match self.queue.retry_or_fail(job).await {
            Ok((_, false)) => {}
            Ok((job, true)) => {
                error!(
                    job_id = %job.id,
                    attempts = job.attempts_made,
                    "SMS job terminally failed"
                );
                self.audit
                    .log(
                        OtpAuditEntry::new(job.phone.clone(), AuditEventType::SentFailed)
                            .with_ip(job.ip.clone())
                            .with_provider(
                                self.provider.name(),
                                Some(serde_json::json!({ "error": reason })),
                            )
                            .with_metadata(serde_json::json!({
                                "request_id": job.request_id,
                                "attempts": job.attempts_made,
                                "worker_id": self.worker_id,
                            })),
                    )
                    .await;
            }
            Err(err) => {
                error!(error = %err, "Failed to re-schedule SMS job; it will be lost");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sms_queue::queue::SmsQueueConfig;
    use crate::application::test_support::StubRepos;
    use crate::infrastructure::kv::MemoryKv;
    use crate::infrastructure::sms::{SmsDelivery, SmsError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct RecordingProvider {
        sent: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl SmsProvider for RecordingProvider {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, _phone: &str, _otp: &str) -> Result<SmsDelivery, SmsError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SmsError::Provider("vendor down".to_string()))
            } else {
                Ok(SmsDelivery {
                    message_id: "m-1".to_string(),
                    duration_ms: 1,
                    attempts: 1,
                })
            }
        }
    }

    fn test_config() -> SmsQueueConfig {
        SmsQueueConfig {
            max_attempts: 2,
            backoff_base: Duration::from_millis(5),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn worker_delivers_and_completes_job() {
        let queue = Arc::new(SmsQueue::new(Arc::new(MemoryKv::new()), test_config()));
        let provider = Arc::new(RecordingProvider {
            sent: AtomicU32::new(0),
            fail: false,
        });
        let repos = Arc::new(StubRepos::default());
        let audit = Arc::new(AuditLogger::new(repos));

        queue
            .enqueue("+919876543210", "123456", "req-1", None)
            .await
            .unwrap();

        let controller = crate::shared::shutdown::ShutdownController::new(5);
        let worker = Arc::new(SmsWorker::new(
            Arc::clone(&queue),
            Arc::clone(&provider) as Arc<dyn SmsProvider>,
            audit,
            2,
        ));
        let handles = worker.start(controller.handle());

        // Wait for the job to drain.
        for _ in 0..100 {
            if queue.depth().await.unwrap() == 0 && provider.sent.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        controller.request_stop();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(provider.sent.load(Ordering::SeqCst), 1);
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn terminal_failure_writes_sent_failed_audit() {
        let queue = Arc::new(SmsQueue::new(Arc::new(MemoryKv::new()), test_config()));
        let provider = Arc::new(RecordingProvider {
            sent: AtomicU32::new(0),
            fail: true,
        });
        let repos = Arc::new(StubRepos::default());
        let audit = Arc::new(AuditLogger::new(
            Arc::clone(&repos) as Arc<dyn crate::domain::RepositoryProvider>,
        ));

        queue
            .enqueue("+919876543210", "123456", "req-1", Some("1.2.3.4".into()))
            .await
            .unwrap();

        let controller = crate::shared::shutdown::ShutdownController::new(5);
        let worker = Arc::new(SmsWorker::new(
            Arc::clone(&queue),
            Arc::clone(&provider) as Arc<dyn SmsProvider>,
            audit,
            1,
        ));
        let handles = worker.start(controller.handle());

        for _ in 0..200 {
            if repos
                .audit_events()
                .contains(&AuditEventType::SentFailed)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        controller.request_stop();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(repos.audit_events().contains(&AuditEventType::SentFailed));
        // Two queue-level attempts were made before giving up.
        assert_eq!(provider.sent.load(Ordering::SeqCst), 2);
    }
}
