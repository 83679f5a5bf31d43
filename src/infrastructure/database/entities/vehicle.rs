//! Vehicle entity for database

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vehicle model
///
/// `reg_number` and `chassis_number` are independently unique; when both
/// appear in a request they must resolve to the same row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub reg_number: String,
    #[sea_orm(unique)]
    pub chassis_number: String,
    pub user_id: Option<String>,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub battery_capacity_kwh: f64,
    pub efficiency_kwh_per_km: f64,
    pub efficiency_factor: f64,
    pub reserve_km: f64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paired_device::Entity")]
    PairedDevices,
}

impl Related<super::paired_device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PairedDevices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
