//! OTP audit repository interface

use async_trait::async_trait;

use super::model::OtpAuditEntry;
use crate::domain::DomainResult;

#[async_trait]
pub trait OtpAuditRepository: Send + Sync {
    /// Append one audit row. The trail is append-only; there is no update
    /// or delete surface.
    async fn insert(&self, entry: OtpAuditEntry) -> DomainResult<()>;
}
