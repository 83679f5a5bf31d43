//! Create stations table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Stations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Stations::Latitude).double().not_null())
                    .col(ColumnDef::new(Stations::Longitude).double().not_null())
                    .col(ColumnDef::new(Stations::Name).string().not_null())
                    .col(ColumnDef::new(Stations::PowerKw).double().not_null())
                    .col(ColumnDef::new(Stations::Plugs).json().not_null())
                    .col(
                        ColumnDef::new(Stations::AvailabilityStatus)
                            .string()
                            .not_null()
                            .default("unknown"),
                    )
                    .col(ColumnDef::new(Stations::OperatorName).string().not_null())
                    .col(ColumnDef::new(Stations::Address).string().not_null())
                    .col(ColumnDef::new(Stations::City).string().not_null())
                    .col(ColumnDef::new(Stations::State).string().not_null())
                    .col(ColumnDef::new(Stations::PricingInfo).json().not_null())
                    .col(ColumnDef::new(Stations::Amenities).json().not_null())
                    .to_owned(),
            )
            .await?;

        // Bounding-box fallback scans when the geo index is cold.
        manager
            .create_index(
                Index::create()
                    .name("idx_stations_lat_lng")
                    .table(Stations::Table)
                    .col(Stations::Latitude)
                    .col(Stations::Longitude)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Stations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Stations {
    Table,
    Id,
    Latitude,
    Longitude,
    Name,
    PowerKw,
    Plugs,
    AvailabilityStatus,
    OperatorName,
    Address,
    City,
    State,
    PricingInfo,
    Amenities,
}
