//! Transactional pairing executor
//!
//! Runs the whole pairing flow inside one relational transaction,
//! serialized per chassis number by an advisory try-lock. Losers of the
//! lock race get `RESOURCE_LOCKED` and retry; they never block.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};

use crate::domain::pairing::{PairingCommand, PairingOutcome, PairingStore};
use crate::domain::vehicle::model::{DEFAULT_EFFICIENCY_FACTOR, DEFAULT_RESERVE_KM};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::advisory::LockRegistry;
use crate::infrastructure::database::entities::{paired_device, vehicle};

use super::db_err;

pub struct SeaOrmPairingStore {
    db: DatabaseConnection,
    locks: Arc<LockRegistry>,
}

impl SeaOrmPairingStore {
    pub fn new(db: DatabaseConnection, locks: Arc<LockRegistry>) -> Self {
        Self { db, locks }
    }

    async fn run_pairing(
        &self,
        txn: &DatabaseTransaction,
        command: &PairingCommand,
    ) -> DomainResult<PairingOutcome> {
        let now = Utc::now();

        // Idempotent replay: the key maps straight to the executed outcome.
        if let Some(key) = &command.idempotency_key {
            let existing = paired_device::Entity::find()
                .filter(paired_device::Column::UserId.eq(command.user_id.as_str()))
                .filter(paired_device::Column::IdempotencyKey.eq(key.as_str()))
                .one(txn)
                .await
                .map_err(db_err)?;

            if let Some(device) = existing {
                let total_active = self.count_active(txn, &command.user_id).await?;
                return Ok(PairingOutcome {
                    vehicle_id: device.vehicle_id,
                    paired_device_id: device.id,
                    created: false,
                    idempotent_replay: true,
                    total_active,
                });
            }
        }

        let vehicle_id = self.upsert_vehicle(txn, command, now).await?;

        let existing_device = paired_device::Entity::find()
            .filter(paired_device::Column::UserId.eq(command.user_id.as_str()))
            .filter(paired_device::Column::ChassisNumber.eq(command.chassis_number.as_str()))
            .one(txn)
            .await
            .map_err(db_err)?;

        let (paired_device_id, created) = match existing_device {
            Some(device) => {
                let device_id = device.id.clone();
                let mut active: paired_device::ActiveModel = device.into();
                active.vehicle_id = Set(vehicle_id.clone());
                active.reg_number = Set(command.reg_number.clone());
                if command.bluetooth_mac.is_some() {
                    active.bluetooth_mac = Set(command.bluetooth_mac.clone());
                }
                active.is_active = Set(true);
                active.connected_at = Set(now);
                active.last_seen = Set(now);
                active.idempotency_key = Set(command.idempotency_key.clone());
                active.updated_at = Set(now);
                active.update(txn).await.map_err(db_err)?;
                (device_id, false)
            }
            None => {
                let device_id = uuid::Uuid::new_v4().to_string();
                let row = paired_device::ActiveModel {
                    id: Set(device_id.clone()),
                    user_id: Set(command.user_id.clone()),
                    vehicle_id: Set(vehicle_id.clone()),
                    chassis_number: Set(command.chassis_number.clone()),
                    reg_number: Set(command.reg_number.clone()),
                    bluetooth_mac: Set(command.bluetooth_mac.clone()),
                    is_active: Set(true),
                    connected_at: Set(now),
                    last_seen: Set(now),
                    idempotency_key: Set(command.idempotency_key.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                row.insert(txn).await.map_err(db_err)?;
                (device_id, true)
            }
        };

        let total_active = self.count_active(txn, &command.user_id).await?;

        Ok(PairingOutcome {
            vehicle_id,
            paired_device_id,
            created,
            idempotent_replay: false,
            total_active,
        })
    }

    /// Resolve the vehicle by chassis, then by reg; update changed fields
    /// on a hit (binding `user_id` when unbound) or insert a new row.
    async fn upsert_vehicle(
        &self,
        txn: &DatabaseTransaction,
        command: &PairingCommand,
        now: chrono::DateTime<Utc>,
    ) -> DomainResult<String> {
        let mut found = vehicle::Entity::find()
            .filter(vehicle::Column::ChassisNumber.eq(command.chassis_number.as_str()))
            .one(txn)
            .await
            .map_err(db_err)?;

        if found.is_none() {
            found = vehicle::Entity::find()
                .filter(vehicle::Column::RegNumber.eq(command.reg_number.as_str()))
                .one(txn)
                .await
                .map_err(db_err)?;
        }

        let stat = command.vehicle_static.clone().unwrap_or_default();

        match found {
            Some(model) => {
                let vehicle_id = model.id.clone();
                let mut active: vehicle::ActiveModel = model.clone().into();
                if model.user_id.is_none() {
                    active.user_id = Set(Some(command.user_id.clone()));
                }
                if model.reg_number != command.reg_number {
                    active.reg_number = Set(command.reg_number.clone());
                }
                if let Some(make) = stat.make {
                    active.make = Set(make);
                }
                if let Some(vehicle_model) = stat.model {
                    active.model = Set(vehicle_model);
                }
                if let Some(year) = stat.year {
                    active.year = Set(year);
                }
                if let Some(capacity) = stat.battery_capacity_kwh {
                    active.battery_capacity_kwh = Set(capacity);
                }
                if let Some(efficiency) = stat.efficiency_kwh_per_km {
                    active.efficiency_kwh_per_km = Set(efficiency);
                }
                if let Some(factor) = stat.efficiency_factor {
                    active.efficiency_factor = Set(factor);
                }
                if let Some(reserve) = stat.reserve_km {
                    active.reserve_km = Set(reserve);
                }
                if stat.image_url.is_some() {
                    active.image_url = Set(stat.image_url);
                }
                active.updated_at = Set(now);
                active.update(txn).await.map_err(db_err)?;
                Ok(vehicle_id)
            }
            None => {
                let vehicle_id = uuid::Uuid::new_v4().to_string();
                let row = vehicle::ActiveModel {
                    id: Set(vehicle_id.clone()),
                    reg_number: Set(command.reg_number.clone()),
                    chassis_number: Set(command.chassis_number.clone()),
                    user_id: Set(Some(command.user_id.clone())),
                    make: Set(stat.make.unwrap_or_else(|| "Unknown".to_string())),
                    model: Set(stat.model.unwrap_or_else(|| "Unknown".to_string())),
                    year: Set(stat.year.unwrap_or(0)),
                    battery_capacity_kwh: Set(stat.battery_capacity_kwh.unwrap_or(0.0)),
                    efficiency_kwh_per_km: Set(stat.efficiency_kwh_per_km.unwrap_or(0.0)),
                    efficiency_factor: Set(stat
                        .efficiency_factor
                        .unwrap_or(DEFAULT_EFFICIENCY_FACTOR)),
                    reserve_km: Set(stat.reserve_km.unwrap_or(DEFAULT_RESERVE_KM)),
                    image_url: Set(stat.image_url),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                row.insert(txn).await.map_err(db_err)?;
                Ok(vehicle_id)
            }
        }
    }

    async fn count_active(&self, txn: &DatabaseTransaction, user_id: &str) -> DomainResult<u64> {
        paired_device::Entity::find()
            .filter(paired_device::Column::UserId.eq(user_id))
            .filter(paired_device::Column::IsActive.eq(true))
            .count(txn)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl PairingStore for SeaOrmPairingStore {
    async fn execute_pairing(&self, command: PairingCommand) -> DomainResult<PairingOutcome> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let lock_key = format!("pairing:{}", command.chassis_number);
        let Some(_lock) = self.locks.try_lock(&lock_key) else {
            txn.rollback().await.ok();
            return Err(DomainError::ResourceLocked(format!(
                "Pairing for chassis {} is already in progress",
                command.chassis_number
            )));
        };

        match self.run_pairing(&txn, &command).await {
            Ok(outcome) => {
                txn.commit().await.map_err(db_err)?;
                Ok(outcome)
            }
            Err(err) => {
                txn.rollback().await.ok();
                Err(err)
            }
        }
    }
}
