//! Charging-station entity for database

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Station model. `plugs` and `amenities` are JSON arrays, `pricing_info`
/// an opaque JSON object.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub power_kw: f64,
    pub plugs: Json,
    pub availability_status: String,
    pub operator_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pricing_info: Json,
    pub amenities: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
