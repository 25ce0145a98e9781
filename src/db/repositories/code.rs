use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::is_unique_violation;
use crate::domain::CodeValue;
use crate::entities::customer_codes;
use crate::entities::sea_orm_active_enums::CodeStatus;

/// Result of attempting to persist a new ACTIVE code.
#[derive(Debug)]
pub enum CodeInsert {
    Inserted(customer_codes::Model),
    /// One of the ACTIVE partial unique indexes fired: either the customer
    /// already holds an ACTIVE code or the value is taken.
    Conflict,
}

pub struct CodeRepository {
    conn: DatabaseConnection,
}

impl CodeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<customer_codes::Model>> {
        customer_codes::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query customer code by ID")
    }

    /// Look up a code by its 6-digit value. Values are recycled once a code is
    /// terminal, so the ACTIVE holder wins, then the most recent one.
    pub async fn get_by_value(&self, value: &str) -> Result<Option<customer_codes::Model>> {
        let rows = customer_codes::Entity::find()
            .filter(customer_codes::Column::Code.eq(value))
            .order_by_desc(customer_codes::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to query customer code by value")?;

        let active = rows.iter().position(|c| c.status == CodeStatus::Active);
        Ok(match active {
            Some(index) => rows.into_iter().nth(index),
            None => rows.into_iter().next(),
        })
    }

    /// All rows still marked ACTIVE for a customer, newest first. May include
    /// rows whose expiry has passed but that nobody has inspected yet.
    pub async fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<customer_codes::Model>> {
        customer_codes::Entity::find()
            .filter(customer_codes::Column::UserId.eq(user_id))
            .filter(customer_codes::Column::Status.eq(CodeStatus::Active))
            .order_by_desc(customer_codes::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to query active customer codes")
    }

    /// The customer's ACTIVE code that is still live at `now`.
    pub async fn find_live_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<customer_codes::Model>> {
        Ok(self
            .list_active_for_user(user_id)
            .await?
            .into_iter()
            .find(|c| !crate::domain::is_expired(c.expires_at, now)))
    }

    pub async fn insert_active(
        &self,
        user_id: Uuid,
        value: &CodeValue,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CodeInsert> {
        let model = customer_codes::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(value.as_str().to_string()),
            user_id: Set(user_id),
            status: Set(CodeStatus::Active),
            expires_at: Set(expires_at),
            created_at: Set(now),
            used_at: Set(None),
        };

        match model.insert(&self.conn).await {
            Ok(code) => Ok(CodeInsert::Inserted(code)),
            Err(e) if is_unique_violation(&e) => Ok(CodeInsert::Conflict),
            Err(e) => Err(e).context("Failed to insert customer code"),
        }
    }

    /// ACTIVE → EXPIRED, only if the row is still ACTIVE. Returns whether this
    /// call performed the transition.
    pub async fn expire_if_active(&self, id: Uuid) -> Result<bool> {
        let result = customer_codes::Entity::update_many()
            .col_expr(customer_codes::Column::Status, Expr::value(CodeStatus::Expired))
            .filter(customer_codes::Column::Id.eq(id))
            .filter(customer_codes::Column::Status.eq(CodeStatus::Active))
            .exec(&self.conn)
            .await
            .context("Failed to expire customer code")?;

        Ok(result.rows_affected > 0)
    }

    /// Expire every ACTIVE code of a customer whose expiry has passed.
    pub async fn expire_stale_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let stale: Vec<Uuid> = self
            .list_active_for_user(user_id)
            .await?
            .into_iter()
            .filter(|c| crate::domain::is_expired(c.expires_at, now))
            .map(|c| c.id)
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let result = customer_codes::Entity::update_many()
            .col_expr(customer_codes::Column::Status, Expr::value(CodeStatus::Expired))
            .filter(customer_codes::Column::Id.is_in(stale))
            .filter(customer_codes::Column::Status.eq(CodeStatus::Active))
            .exec(&self.conn)
            .await
            .context("Failed to expire stale customer codes")?;

        Ok(result.rows_affected)
    }
}
