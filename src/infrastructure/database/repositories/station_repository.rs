use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::domain::station::{Station, StationRepository};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::station;

use super::db_err;

pub struct SeaOrmStationRepository {
    db: DatabaseConnection,
}

impl SeaOrmStationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn station_model_to_domain(model: station::Model) -> Station {
    Station {
        id: model.id,
        latitude: model.latitude,
        longitude: model.longitude,
        name: model.name,
        power_kw: model.power_kw,
        // Malformed plug JSON degrades to an empty list rather than failing
        // the whole radius query.
        plugs: serde_json::from_value(model.plugs).unwrap_or_default(),
        availability_status: model.availability_status,
        operator_name: model.operator_name,
        address: model.address,
        city: model.city,
        state: model.state,
        pricing_info: model.pricing_info,
        amenities: serde_json::from_value(model.amenities).unwrap_or_default(),
    }
}

#[async_trait]
impl StationRepository for SeaOrmStationRepository {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Station>> {
        let model = station::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(station_model_to_domain))
    }

    async fn find_in_bounding_box(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> DomainResult<Vec<Station>> {
        let models = station::Entity::find()
            .filter(station::Column::Latitude.between(min_lat, max_lat))
            .filter(station::Column::Longitude.between(min_lng, max_lng))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models.into_iter().map(station_model_to_domain).collect())
    }

    async fn list_page(&self, offset: u64, limit: u64) -> DomainResult<Vec<Station>> {
        let models = station::Entity::find()
            .order_by_asc(station::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models.into_iter().map(station_model_to_domain).collect())
    }
}
