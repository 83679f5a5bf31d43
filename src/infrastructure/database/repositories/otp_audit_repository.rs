use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::domain::otp::{OtpAuditEntry, OtpAuditRepository};
use crate::domain::DomainResult;
use crate::infrastructure::database::entities::otp_audit;

use super::db_err;

pub struct SeaOrmOtpAuditRepository {
    db: DatabaseConnection,
}

impl SeaOrmOtpAuditRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtpAuditRepository for SeaOrmOtpAuditRepository {
    async fn insert(&self, entry: OtpAuditEntry) -> DomainResult<()> {
        let row = otp_audit::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            phone: Set(entry.phone),
            event_type: Set(entry.event_type.as_str().to_string()),
            provider: Set(entry.provider),
            provider_response: Set(entry.provider_response),
            ip: Set(entry.ip),
            user_agent: Set(entry.user_agent),
            metadata: Set(entry.metadata),
            created_at: Set(Utc::now()),
        };

        row.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}
