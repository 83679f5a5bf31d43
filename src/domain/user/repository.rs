//! User repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::User;
use crate::domain::DomainResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<User>>;
    async fn find_by_phone(&self, phone: &str) -> DomainResult<Option<User>>;
    /// Flip `is_verified` and stamp `last_login_at` after a successful OTP
    /// verification. Single-statement upsert semantics.
    async fn mark_verified(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()>;
    /// Page through all phone numbers, for existence-filter population.
    async fn list_phones(&self, offset: u64, limit: u64) -> DomainResult<Vec<String>>;
    async fn count(&self) -> DomainResult<u64>;
}
