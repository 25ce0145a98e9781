use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::is_unique_violation;
use crate::entities::sea_orm_active_enums::{CodeStatus, RewardStatus, RewardType, StampStatus};
use crate::entities::{customer_codes, rewards, stamps};

/// Reward to create in the same transaction as the stamp that earned it.
#[derive(Debug, Clone)]
pub struct RewardGrant {
    pub reward_type: RewardType,
    pub stamps_used: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum Accrual {
    Accrued {
        stamp: stamps::Model,
        new_stamp_count: u64,
        reward: Option<rewards::Model>,
    },
    /// The code was no longer ACTIVE, or another stamp already claimed it.
    AlreadyUsed,
}

pub struct StampRepository {
    conn: DatabaseConnection,
}

impl StampRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_code(&self, customer_code_id: Uuid) -> Result<Option<stamps::Model>> {
        stamps::Entity::find()
            .filter(stamps::Column::CustomerCodeId.eq(customer_code_id))
            .one(&self.conn)
            .await
            .context("Failed to query stamp by customer code")
    }

    pub async fn count_active(&self, user_id: Uuid) -> Result<u64> {
        count_active(&self.conn, user_id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<stamps::Model>> {
        stamps::Entity::find()
            .filter(stamps::Column::UserId.eq(user_id))
            .order_by_desc(stamps::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list stamps")
    }

    /// Consume `code`, record the stamp and, if `grant_for` asks for one,
    /// the reward, all in one transaction.
    ///
    /// The code transition is the first write and is conditioned on the row
    /// still being ACTIVE, so concurrent callers serialize on it; the unique
    /// stamp-to-code link backs that up.
    pub async fn accrue<F>(
        &self,
        code: &customer_codes::Model,
        staff_id: Uuid,
        now: DateTime<Utc>,
        grant_for: F,
    ) -> Result<Accrual>
    where
        F: FnOnce(u64) -> Option<RewardGrant> + Send,
    {
        let txn = self.conn.begin().await?;

        let claimed = customer_codes::Entity::update_many()
            .col_expr(customer_codes::Column::Status, Expr::value(CodeStatus::Used))
            .col_expr(customer_codes::Column::UsedAt, Expr::value(now))
            .filter(customer_codes::Column::Id.eq(code.id))
            .filter(customer_codes::Column::Status.eq(CodeStatus::Active))
            .exec(&txn)
            .await
            .context("Failed to mark customer code used")?;

        if claimed.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(Accrual::AlreadyUsed);
        }

        let stamp = stamps::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(code.user_id),
            customer_code_id: Set(Some(code.id)),
            created_by_id: Set(staff_id),
            status: Set(StampStatus::Active),
            created_at: Set(now),
            redeemed_at: Set(None),
        };

        let stamp = match stamp.insert(&txn).await {
            Ok(stamp) => stamp,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Ok(Accrual::AlreadyUsed);
            }
            Err(e) => return Err(e).context("Failed to insert stamp"),
        };

        let new_stamp_count = count_active(&txn, code.user_id).await?;

        let reward = match grant_for(new_stamp_count) {
            Some(grant) => Some(
                rewards::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(code.user_id),
                    reward_type: Set(grant.reward_type),
                    status: Set(RewardStatus::Available),
                    stamps_used: Set(grant.stamps_used),
                    created_at: Set(now),
                    expires_at: Set(grant.expires_at),
                }
                .insert(&txn)
                .await
                .context("Failed to insert reward")?,
            ),
            None => None,
        };

        txn.commit().await?;

        Ok(Accrual::Accrued {
            stamp,
            new_stamp_count,
            reward,
        })
    }
}

async fn count_active<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64> {
    stamps::Entity::find()
        .filter(stamps::Column::UserId.eq(user_id))
        .filter(stamps::Column::Status.eq(StampStatus::Active))
        .count(conn)
        .await
        .context("Failed to count active stamps")
}
