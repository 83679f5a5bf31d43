//! Pairing registry service
//!
//! Validates and canonicalizes the pairing request, runs the transactional
//! pairing executor, then invalidates the listing caches and the cached
//! vehicle record.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};

use crate::application::listing::PairedDeviceListingService;
use crate::domain::pairing::{PairingCommand, PairingOutcome};
use crate::domain::vehicle::canonical_reg_number;
use crate::domain::vehicle::VehicleStatic;
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::infrastructure::kv::KvStore;

/// Pairing request as validated by the HTTP layer.
#[derive(Debug, Clone)]
pub struct PairRequest {
    pub user_id: String,
    pub chassis_number: String,
    pub reg_number: String,
    pub bluetooth_mac: Option<String>,
    pub vehicle_static: Option<VehicleStatic>,
    pub idempotency_key: Option<String>,
}

pub struct PairingService {
    kv: Arc<dyn KvStore>,
    repos: Arc<dyn RepositoryProvider>,
    listing: Arc<PairedDeviceListingService>,
}

impl PairingService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        repos: Arc<dyn RepositoryProvider>,
        listing: Arc<PairedDeviceListingService>,
    ) -> Self {
        Self {
            kv,
            repos,
            listing,
        }
    }

    pub async fn pair(&self, request: PairRequest) -> DomainResult<PairingOutcome> {
        let chassis_number = request.chassis_number.trim().to_string();
        if chassis_number.is_empty() {
            return Err(DomainError::validation("chassis_number is required"));
        }

        let reg_number = canonical_reg_number(&request.reg_number);
        if reg_number.is_empty() {
            return Err(DomainError::validation("reg_number is required"));
        }

        if let Some(key) = &request.idempotency_key {
            if uuid::Uuid::parse_str(key).is_err() {
                return Err(DomainError::validation("Idempotency-Key must be a UUID"));
            }
        }

        let outcome = self
            .repos
            .pairing()
            .execute_pairing(PairingCommand {
                user_id: request.user_id.clone(),
                chassis_number: chassis_number.clone(),
                reg_number: reg_number.clone(),
                bluetooth_mac: request.bluetooth_mac,
                vehicle_static: request.vehicle_static,
                idempotency_key: request.idempotency_key,
            })
            .await?;

        // The vehicle row may have changed; drop its cached copy and make
        // the listing caches unreachable.
        if let Err(err) = self.kv.del(&format!("vehicle:{reg_number}")).await {
            warn!(reg_number, error = %err, "Vehicle cache invalidation failed");
        }
        self.listing.invalidate_user(&request.user_id).await;

        counter!("pairings_total", "outcome" => if outcome.idempotent_replay {
            "replay"
        } else if outcome.created {
            "created"
        } else {
            "updated"
        })
        .increment(1);

        info!(
            user_id = %request.user_id,
            chassis_number = %chassis_number,
            vehicle_id = %outcome.vehicle_id,
            created = outcome.created,
            replay = outcome.idempotent_replay,
            "Pairing completed"
        );

        Ok(outcome)
    }
}
