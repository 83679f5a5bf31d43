use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::domain::vehicle::{Vehicle, VehicleRepository};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::vehicle;

use super::db_err;

pub struct SeaOrmVehicleRepository {
    db: DatabaseConnection,
}

impl SeaOrmVehicleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) fn vehicle_model_to_domain(model: vehicle::Model) -> Vehicle {
    Vehicle {
        id: model.id,
        reg_number: model.reg_number,
        chassis_number: model.chassis_number,
        user_id: model.user_id,
        make: model.make,
        model: model.model,
        year: model.year,
        battery_capacity_kwh: model.battery_capacity_kwh,
        efficiency_kwh_per_km: model.efficiency_kwh_per_km,
        efficiency_factor: model.efficiency_factor,
        reserve_km: model.reserve_km,
        image_url: model.image_url,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[async_trait]
impl VehicleRepository for SeaOrmVehicleRepository {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Vehicle>> {
        let model = vehicle::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(vehicle_model_to_domain))
    }

    async fn find_by_reg_number(&self, reg_number: &str) -> DomainResult<Option<Vehicle>> {
        let model = vehicle::Entity::find()
            .filter(vehicle::Column::RegNumber.eq(reg_number))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(vehicle_model_to_domain))
    }

    async fn find_by_chassis_number(&self, chassis_number: &str) -> DomainResult<Option<Vehicle>> {
        let model = vehicle::Entity::find()
            .filter(vehicle::Column::ChassisNumber.eq(chassis_number))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(vehicle_model_to_domain))
    }

    async fn find_by_ids(&self, ids: &[String]) -> DomainResult<Vec<Vehicle>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = vehicle::Entity::find()
            .filter(vehicle::Column::Id.is_in(ids.iter().cloned()))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models.into_iter().map(vehicle_model_to_domain).collect())
    }
}
