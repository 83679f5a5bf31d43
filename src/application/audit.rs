//! OTP audit trail writer
//!
//! Every lifecycle event lands in the append-only audit table. A failed
//! audit write is logged and swallowed: audits must never take the auth
//! flow down with them, and they are allowed to outlive a cancelled
//! request.

use std::sync::Arc;

use metrics::counter;
use tracing::error;

use crate::domain::otp::OtpAuditEntry;
use crate::domain::RepositoryProvider;

pub struct AuditLogger {
    repos: Arc<dyn RepositoryProvider>,
}

impl AuditLogger {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    pub async fn log(&self, entry: OtpAuditEntry) {
        let event = entry.event_type.as_str();
        counter!("otp_audit_events_total", "event" => event).increment(1);

        if let Err(err) = self.repos.otp_audit().insert(entry).await {
            error!(event, error = %err, "Failed to write OTP audit record");
        }
    }
}
