//! Create otp_audits table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OtpAudits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OtpAudits::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OtpAudits::Phone).string().not_null())
                    .col(ColumnDef::new(OtpAudits::EventType).string().not_null())
                    .col(ColumnDef::new(OtpAudits::Provider).string())
                    .col(ColumnDef::new(OtpAudits::ProviderResponse).json())
                    .col(ColumnDef::new(OtpAudits::Ip).string())
                    .col(ColumnDef::new(OtpAudits::UserAgent).string())
                    .col(ColumnDef::new(OtpAudits::Metadata).json())
                    .col(
                        ColumnDef::new(OtpAudits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Rolling-window audits are queried by (phone, created_at).
        manager
            .create_index(
                Index::create()
                    .name("idx_otp_audits_phone_created")
                    .table(OtpAudits::Table)
                    .col(OtpAudits::Phone)
                    .col(OtpAudits::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OtpAudits::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum OtpAudits {
    Table,
    Id,
    Phone,
    EventType,
    Provider,
    ProviderResponse,
    Ip,
    UserAgent,
    Metadata,
    CreatedAt,
}
