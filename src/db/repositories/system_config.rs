use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::system_config;

/// Operator-editable overrides for the loyalty tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemSettings {
    pub stamps_for_reward: i32,
    pub code_expiration_minutes: i32,
    pub reward_expiration_days: i32,
    pub is_maintenance_mode: bool,
}

impl From<system_config::Model> for SystemSettings {
    fn from(model: system_config::Model) -> Self {
        Self {
            stamps_for_reward: model.stamps_for_reward,
            code_expiration_minutes: model.code_expiration_minutes,
            reward_expiration_days: model.reward_expiration_days,
            is_maintenance_mode: model.is_maintenance_mode,
        }
    }
}

pub struct SystemConfigRepository {
    conn: DatabaseConnection,
}

impl SystemConfigRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// The single settings row, if an operator has created one.
    pub async fn get(&self) -> Result<Option<SystemSettings>> {
        let row = system_config::Entity::find()
            .one(&self.conn)
            .await
            .context("Failed to query system config")?;

        Ok(row.map(SystemSettings::from))
    }

    pub async fn upsert(&self, settings: SystemSettings, now: DateTime<Utc>) -> Result<()> {
        let existing = system_config::Entity::find()
            .one(&self.conn)
            .await
            .context("Failed to query system config")?;

        match existing {
            Some(row) => {
                let mut active: system_config::ActiveModel = row.into();
                active.stamps_for_reward = Set(settings.stamps_for_reward);
                active.code_expiration_minutes = Set(settings.code_expiration_minutes);
                active.reward_expiration_days = Set(settings.reward_expiration_days);
                active.is_maintenance_mode = Set(settings.is_maintenance_mode);
                active.updated_at = Set(now);
                active.update(&self.conn).await?;
            }
            None => {
                system_config::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    stamps_for_reward: Set(settings.stamps_for_reward),
                    code_expiration_minutes: Set(settings.code_expiration_minutes),
                    reward_expiration_days: Set(settings.reward_expiration_days),
                    is_maintenance_mode: Set(settings.is_maintenance_mode),
                    updated_at: Set(now),
                }
                .insert(&self.conn)
                .await?;
            }
        }

        Ok(())
    }
}
