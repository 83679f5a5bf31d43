//! Create paired_devices table

use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_users::Users;
use super::m20250301_000002_create_vehicles::Vehicles;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PairedDevices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PairedDevices::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PairedDevices::UserId).string().not_null())
                    .col(ColumnDef::new(PairedDevices::VehicleId).string().not_null())
                    .col(
                        ColumnDef::new(PairedDevices::ChassisNumber)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PairedDevices::RegNumber).string().not_null())
                    .col(ColumnDef::new(PairedDevices::BluetoothMac).string())
                    .col(
                        ColumnDef::new(PairedDevices::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PairedDevices::ConnectedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PairedDevices::LastSeen)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PairedDevices::IdempotencyKey).string())
                    .col(
                        ColumnDef::new(PairedDevices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PairedDevices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_paired_devices_user")
                            .from(PairedDevices::Table, PairedDevices::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_paired_devices_vehicle")
                            .from(PairedDevices::Table, PairedDevices::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One pairing per (user, chassis); re-pairing updates in place.
        manager
            .create_index(
                Index::create()
                    .name("idx_paired_devices_user_chassis")
                    .table(PairedDevices::Table)
                    .col(PairedDevices::UserId)
                    .col(PairedDevices::ChassisNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_paired_devices_user_idempotency")
                    .table(PairedDevices::Table)
                    .col(PairedDevices::UserId)
                    .col(PairedDevices::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Keyset pagination scans (user_id, last_seen desc).
        manager
            .create_index(
                Index::create()
                    .name("idx_paired_devices_user_last_seen")
                    .table(PairedDevices::Table)
                    .col(PairedDevices::UserId)
                    .col(PairedDevices::LastSeen)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PairedDevices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PairedDevices {
    Table,
    Id,
    UserId,
    VehicleId,
    ChassisNumber,
    RegNumber,
    BluetoothMac,
    IsActive,
    ConnectedAt,
    LastSeen,
    IdempotencyKey,
    CreatedAt,
    UpdatedAt,
}
