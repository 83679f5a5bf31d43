//! Station repository interface

use async_trait::async_trait;

use super::model::Station;
use crate::domain::DomainResult;

#[async_trait]
pub trait StationRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Station>>;
    /// Bounding-box fetch used as the fallback radius query when the geo
    /// index is cold. Callers post-filter with the precise distance.
    async fn find_in_bounding_box(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> DomainResult<Vec<Station>>;
    /// Page through all stations, for geo-index population.
    async fn list_page(&self, offset: u64, limit: u64) -> DomainResult<Vec<Station>>;
}
