use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::domain::pairing::{ListSort, PairedDevice, PairedDeviceQuery, PairedDeviceRepository};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::paired_device;

use super::db_err;

pub struct SeaOrmPairedDeviceRepository {
    db: DatabaseConnection,
}

impl SeaOrmPairedDeviceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) fn paired_device_model_to_domain(model: paired_device::Model) -> PairedDevice {
    PairedDevice {
        id: model.id,
        user_id: model.user_id,
        vehicle_id: model.vehicle_id,
        chassis_number: model.chassis_number,
        reg_number: model.reg_number,
        bluetooth_mac: model.bluetooth_mac,
        is_active: model.is_active,
        connected_at: model.connected_at,
        last_seen: model.last_seen,
        idempotency_key: model.idempotency_key,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[async_trait]
impl PairedDeviceRepository for SeaOrmPairedDeviceRepository {
    async fn list_page(&self, query: PairedDeviceQuery) -> DomainResult<Vec<PairedDevice>> {
        let sort_column = match query.sort {
            ListSort::LastSeenDesc => paired_device::Column::LastSeen,
            ListSort::ConnectedAtDesc => paired_device::Column::ConnectedAt,
        };

        let mut select = paired_device::Entity::find()
            .filter(paired_device::Column::UserId.eq(query.user_id.as_str()));

        if let Some(active) = query.active {
            select = select.filter(paired_device::Column::IsActive.eq(active));
        }

        // Keyset predicate: strictly after the cursor row in sort order,
        // ties on the sort timestamp broken by id.
        if let Some(cursor) = &query.cursor {
            select = select.filter(
                Condition::any()
                    .add(sort_column.lt(cursor.last_seen))
                    .add(
                        Condition::all()
                            .add(sort_column.eq(cursor.last_seen))
                            .add(paired_device::Column::Id.lt(cursor.id.as_str())),
                    ),
            );
        }

        let models = select
            .order_by_desc(sort_column)
            .order_by_desc(paired_device::Column::Id)
            .limit(query.limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models
            .into_iter()
            .map(paired_device_model_to_domain)
            .collect())
    }

    async fn find_by_user_and_vehicle(
        &self,
        user_id: &str,
        vehicle_id: &str,
    ) -> DomainResult<Option<PairedDevice>> {
        let model = paired_device::Entity::find()
            .filter(paired_device::Column::UserId.eq(user_id))
            .filter(paired_device::Column::VehicleId.eq(vehicle_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(paired_device_model_to_domain))
    }

    async fn count_for_user(&self, user_id: &str, active_only: bool) -> DomainResult<u64> {
        let mut select =
            paired_device::Entity::find().filter(paired_device::Column::UserId.eq(user_id));

        if active_only {
            select = select.filter(paired_device::Column::IsActive.eq(true));
        }

        select.count(&self.db).await.map_err(db_err)
    }
}
