use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::is_unique_violation;
use crate::entities::sea_orm_active_enums::RewardStatus;
use crate::entities::{redemptions, rewards};

#[derive(Debug)]
pub enum Redeem {
    Redeemed(redemptions::Model),
    /// The reward left AVAILABLE before this call could claim it.
    NotAvailable,
}

pub struct RewardRepository {
    conn: DatabaseConnection,
}

impl RewardRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<rewards::Model>> {
        rewards::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query reward by ID")
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<rewards::Model>> {
        rewards::Entity::find()
            .filter(rewards::Column::UserId.eq(user_id))
            .order_by_desc(rewards::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list rewards")
    }

    pub async fn list_available_for_user(&self, user_id: Uuid) -> Result<Vec<rewards::Model>> {
        rewards::Entity::find()
            .filter(rewards::Column::UserId.eq(user_id))
            .filter(rewards::Column::Status.eq(RewardStatus::Available))
            .order_by_desc(rewards::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list available rewards")
    }

    /// AVAILABLE → EXPIRED, only if still AVAILABLE.
    pub async fn expire_if_available(&self, id: Uuid) -> Result<bool> {
        let result = rewards::Entity::update_many()
            .col_expr(rewards::Column::Status, Expr::value(RewardStatus::Expired))
            .filter(rewards::Column::Id.eq(id))
            .filter(rewards::Column::Status.eq(RewardStatus::Available))
            .exec(&self.conn)
            .await
            .context("Failed to expire reward")?;

        Ok(result.rows_affected > 0)
    }

    /// Flip the reward to REDEEMED and record the redemption atomically.
    pub async fn redeem(
        &self,
        reward: &rewards::Model,
        processed_by: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Redeem> {
        let txn = self.conn.begin().await?;

        let claimed = rewards::Entity::update_many()
            .col_expr(rewards::Column::Status, Expr::value(RewardStatus::Redeemed))
            .filter(rewards::Column::Id.eq(reward.id))
            .filter(rewards::Column::Status.eq(RewardStatus::Available))
            .exec(&txn)
            .await
            .context("Failed to mark reward redeemed")?;

        if claimed.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(Redeem::NotAvailable);
        }

        let redemption = redemptions::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(reward.user_id),
            reward_id: Set(reward.id),
            processed_by_id: Set(processed_by),
            notes: Set(notes),
            created_at: Set(now),
        };

        let redemption = match redemption.insert(&txn).await {
            Ok(redemption) => redemption,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Ok(Redeem::NotAvailable);
            }
            Err(e) => return Err(e).context("Failed to insert redemption"),
        };

        txn.commit().await?;
        Ok(Redeem::Redeemed(redemption))
    }

    pub async fn list_redemptions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<redemptions::Model>> {
        redemptions::Entity::find()
            .filter(redemptions::Column::UserId.eq(user_id))
            .order_by_desc(redemptions::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list redemptions")
    }
}
