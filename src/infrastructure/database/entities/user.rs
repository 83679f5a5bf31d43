//! User entity for database

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Canonical international phone, unique across the platform.
    #[sea_orm(unique)]
    pub phone: String,
    pub country_code: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
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
