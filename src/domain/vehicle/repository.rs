//! Vehicle repository interface

use async_trait::async_trait;

use super::model::Vehicle;
use crate::domain::DomainResult;

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Vehicle>>;
    async fn find_by_reg_number(&self, reg_number: &str) -> DomainResult<Option<Vehicle>>;
    async fn find_by_chassis_number(&self, chassis_number: &str) -> DomainResult<Option<Vehicle>>;
    /// Batch fetch for listing expansions. Order is not guaranteed.
    async fn find_by_ids(&self, ids: &[String]) -> DomainResult<Vec<Vehicle>>;
}
