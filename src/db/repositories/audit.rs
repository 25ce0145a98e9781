use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::domain::events::AuditEvent;
use crate::entities::{audit_logs, prelude::*};

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, event: &AuditEvent, now: DateTime<Utc>) -> Result<()> {
        let active_model = audit_logs::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(event.user_id),
            action: Set(event.action.tag().to_string()),
            details: Set(Some(event.action.details())),
            ip_address: Set(event.meta.ip_address.clone()),
            user_agent: Set(event.meta.user_agent.clone()),
            created_at: Set(now),
        };

        AuditLogs::insert(active_model)
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert audit log")?;
        Ok(())
    }

    /// Entries for a user, oldest first. Used by operators and tests; the
    /// loyalty engine never reads the audit trail.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<audit_logs::Model>> {
        AuditLogs::find()
            .filter(audit_logs::Column::UserId.eq(user_id))
            .order_by_asc(audit_logs::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list audit logs")
    }
}
