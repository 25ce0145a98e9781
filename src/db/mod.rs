use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::domain::CodeValue;
use crate::domain::events::AuditEvent;
use crate::entities::{audit_logs, customer_codes, redemptions, rewards, stamps};

pub mod migrator;
pub mod repositories;

pub use migrator::DEFAULT_ADMIN_PHONE;
pub use repositories::code::CodeInsert;
pub use repositories::reward::Redeem;
pub use repositories::stamp::{Accrual, RewardGrant};
pub use repositories::system_config::SystemSettings;
pub use repositories::user::{NewUser, User};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn code_repo(&self) -> repositories::code::CodeRepository {
        repositories::code::CodeRepository::new(self.conn.clone())
    }

    fn stamp_repo(&self) -> repositories::stamp::StampRepository {
        repositories::stamp::StampRepository::new(self.conn.clone())
    }

    fn reward_repo(&self) -> repositories::reward::RewardRepository {
        repositories::reward::RewardRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    fn system_config_repo(&self) -> repositories::system_config::SystemConfigRepository {
        repositories::system_config::SystemConfigRepository::new(self.conn.clone())
    }

    // Users

    pub async fn create_user(
        &self,
        new_user: NewUser,
        security: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<User> {
        self.user_repo().create(new_user, security, now).await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.user_repo().get_by_phone(phone).await
    }

    pub async fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.user_repo().get_by_api_key(api_key).await
    }

    pub async fn verify_user_password(&self, phone: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(phone, password).await
    }

    pub async fn record_user_login(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.user_repo().record_login(id, now).await
    }

    pub async fn update_user_password(
        &self,
        id: Uuid,
        new_password: &str,
        security: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.user_repo()
            .update_password(id, new_password, security, now)
            .await
    }

    pub async fn regenerate_user_api_key(&self, id: Uuid, now: DateTime<Utc>) -> Result<String> {
        self.user_repo().regenerate_api_key(id, now).await
    }

    // Customer codes

    pub async fn get_code(&self, id: Uuid) -> Result<Option<customer_codes::Model>> {
        self.code_repo().get_by_id(id).await
    }

    pub async fn get_code_by_value(&self, value: &str) -> Result<Option<customer_codes::Model>> {
        self.code_repo().get_by_value(value).await
    }

    pub async fn list_active_codes(&self, user_id: Uuid) -> Result<Vec<customer_codes::Model>> {
        self.code_repo().list_active_for_user(user_id).await
    }

    pub async fn find_live_code(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<customer_codes::Model>> {
        self.code_repo().find_live_for_user(user_id, now).await
    }

    pub async fn insert_code(
        &self,
        user_id: Uuid,
        value: &CodeValue,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CodeInsert> {
        self.code_repo()
            .insert_active(user_id, value, expires_at, now)
            .await
    }

    pub async fn expire_code(&self, id: Uuid) -> Result<bool> {
        self.code_repo().expire_if_active(id).await
    }

    pub async fn expire_stale_codes(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        self.code_repo().expire_stale_for_user(user_id, now).await
    }

    // Stamps

    pub async fn get_stamp_by_code(&self, code_id: Uuid) -> Result<Option<stamps::Model>> {
        self.stamp_repo().get_by_code(code_id).await
    }

    pub async fn count_active_stamps(&self, user_id: Uuid) -> Result<u64> {
        self.stamp_repo().count_active(user_id).await
    }

    pub async fn list_stamps(&self, user_id: Uuid) -> Result<Vec<stamps::Model>> {
        self.stamp_repo().list_for_user(user_id).await
    }

    pub async fn accrue_stamp<F>(
        &self,
        code: &customer_codes::Model,
        staff_id: Uuid,
        now: DateTime<Utc>,
        grant_for: F,
    ) -> Result<Accrual>
    where
        F: FnOnce(u64) -> Option<RewardGrant> + Send,
    {
        self.stamp_repo()
            .accrue(code, staff_id, now, grant_for)
            .await
    }

    // Rewards and redemptions

    pub async fn get_reward(&self, id: Uuid) -> Result<Option<rewards::Model>> {
        self.reward_repo().get_by_id(id).await
    }

    pub async fn list_rewards(&self, user_id: Uuid) -> Result<Vec<rewards::Model>> {
        self.reward_repo().list_for_user(user_id).await
    }

    pub async fn list_available_rewards(&self, user_id: Uuid) -> Result<Vec<rewards::Model>> {
        self.reward_repo().list_available_for_user(user_id).await
    }

    pub async fn expire_reward(&self, id: Uuid) -> Result<bool> {
        self.reward_repo().expire_if_available(id).await
    }

    pub async fn redeem_reward(
        &self,
        reward: &rewards::Model,
        processed_by: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Redeem> {
        self.reward_repo()
            .redeem(reward, processed_by, notes, now)
            .await
    }

    pub async fn list_redemptions(&self, user_id: Uuid) -> Result<Vec<redemptions::Model>> {
        self.reward_repo().list_redemptions_for_user(user_id).await
    }

    // Settings and audit

    pub async fn get_system_settings(&self) -> Result<Option<SystemSettings>> {
        self.system_config_repo().get().await
    }

    pub async fn save_system_settings(
        &self,
        settings: SystemSettings,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.system_config_repo().upsert(settings, now).await
    }

    pub async fn add_audit_log(&self, event: &AuditEvent, now: DateTime<Utc>) -> Result<()> {
        self.audit_repo().add(event, now).await
    }

    pub async fn list_audit_logs(&self, user_id: Uuid) -> Result<Vec<audit_logs::Model>> {
        self.audit_repo().list_for_user(user_id).await
    }
}
