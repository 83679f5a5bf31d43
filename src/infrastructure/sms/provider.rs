//! SMS provider interface
//!
//! The queue workers only ever see this trait; which vendor sits behind it
//! is a deployment concern. The wrapper below smooths over short vendor
//! blips with a few quick re-sends so a queue-level attempt (which costs
//! minutes of backoff) is not spent on a single dropped connection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SmsError {
    /// Vendor-side failure, worth retrying.
    #[error("SMS provider error: {0}")]
    Provider(String),
    /// The recipient can never receive this message; do not retry.
    #[error("Invalid SMS recipient: {0}")]
    InvalidRecipient(String),
}

impl SmsError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

/// Outcome of a delivered message.
#[derive(Debug, Clone)]
pub struct SmsDelivery {
    pub message_id: String,
    pub duration_ms: u64,
    pub attempts: u32,
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, phone: &str, otp: &str) -> Result<SmsDelivery, SmsError>;
}

/// Development provider: logs the message instead of dispatching it.
pub struct ConsoleSmsProvider;

#[async_trait]
impl SmsProvider for ConsoleSmsProvider {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, phone: &str, otp: &str) -> Result<SmsDelivery, SmsError> {
        info!(phone, otp, "📨 [console] OTP message");
        Ok(SmsDelivery {
            message_id: uuid::Uuid::new_v4().to_string(),
            duration_ms: 0,
            attempts: 1,
        })
    }
}

/// Vendor client with the dispatch retry policy applied.
///
/// Transient vendor errors get up to `max_attempts` quick re-sends at a
/// fixed interval; permanent rejections (bad recipient) surface at once.
/// Exponential backoff between whole dispatch attempts stays with the
/// queue, not here. The returned delivery reports the attempts actually
/// spent and the wall-clock time across all of them.
pub struct RetryingSmsProvider {
    inner: Box<dyn SmsProvider>,
    max_attempts: u32,
    retry_interval: Duration,
}

impl RetryingSmsProvider {
    pub fn new(inner: Box<dyn SmsProvider>) -> Self {
        Self::with_policy(inner, 3, Duration::from_millis(500))
    }

    pub fn with_policy(
        inner: Box<dyn SmsProvider>,
        max_attempts: u32,
        retry_interval: Duration,
    ) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            retry_interval,
        }
    }
}

#[async_trait]
impl SmsProvider for RetryingSmsProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn send(&self, phone: &str, otp: &str) -> Result<SmsDelivery, SmsError> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.inner.send(phone, otp).await {
                Ok(mut delivery) => {
                    delivery.attempts = attempt;
                    delivery.duration_ms = started.elapsed().as_millis() as u64;
                    return Ok(delivery);
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "Vendor send failed; re-sending shortly"
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(err) => {
                    warn!(
                        provider = self.inner.name(),
                        attempts_spent = attempt,
                        error = %err,
                        "Vendor send gave up"
                    );
                    return Err(err);
                }
            }
        }
    }
}
