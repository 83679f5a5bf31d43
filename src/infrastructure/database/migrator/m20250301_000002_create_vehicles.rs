//! Create vehicles table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vehicles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vehicles::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::RegNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::ChassisNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Vehicles::UserId).string())
                    .col(ColumnDef::new(Vehicles::Make).string().not_null())
                    .col(ColumnDef::new(Vehicles::Model).string().not_null())
                    .col(ColumnDef::new(Vehicles::Year).integer().not_null())
                    .col(
                        ColumnDef::new(Vehicles::BatteryCapacityKwh)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::EfficiencyKwhPerKm)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::EfficiencyFactor)
                            .double()
                            .not_null()
                            .default(0.88),
                    )
                    .col(
                        ColumnDef::new(Vehicles::ReserveKm)
                            .double()
                            .not_null()
                            .default(7.0),
                    )
                    .col(ColumnDef::new(Vehicles::ImageUrl).string())
                    .col(
                        ColumnDef::new(Vehicles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Vehicles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vehicles::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Vehicles {
    Table,
    Id,
    RegNumber,
    ChassisNumber,
    UserId,
    Make,
    Model,
    Year,
    BatteryCapacityKwh,
    EfficiencyKwhPerKm,
    EfficiencyFactor,
    ReserveKm,
    ImageUrl,
    CreatedAt,
    UpdatedAt,
}
