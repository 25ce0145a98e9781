//! Domain service for the stamp/code/reward lifecycle.
//!
//! Four operations make up the engine: issuing a customer code, validating
//! it on the staff side, turning it into a stamp (which may earn a reward),
//! and redeeming a reward.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Actor, CodeStatus, RewardStatus, RewardType, StampStatus};
use crate::entities::{customer_codes, redemptions, rewards, stamps};

/// Errors returned by the loyalty engine.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("Your account is not allowed to {0}")]
    ForbiddenRole(&'static str),

    #[error("You do not have access to this {0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Customer code is not active")]
    CodeInactive,

    #[error("Customer code has expired, ask the customer to generate a new one")]
    CodeExpired,

    #[error("Customer code has already been used")]
    CodeAlreadyUsed,

    #[error("Reward is not available for redemption")]
    RewardNotAvailable,

    #[error("Reward has expired")]
    RewardExpired,

    #[error("Could not allocate a unique customer code, please retry")]
    CodeSpaceExhausted,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LoyaltyError {
    /// Stable machine-readable tag for clients.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ForbiddenRole(_) => "FORBIDDEN_ROLE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::CodeInactive => "CODE_INACTIVE",
            Self::CodeExpired => "CODE_EXPIRED",
            Self::CodeAlreadyUsed => "CODE_ALREADY_USED",
            Self::RewardNotAvailable => "REWARD_NOT_AVAILABLE",
            Self::RewardExpired => "REWARD_EXPIRED",
            Self::CodeSpaceExhausted | Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for LoyaltyError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for LoyaltyError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}

/// Effective tunables for one operation, after merging the database
/// settings row over the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltySettings {
    pub stamps_for_reward: u32,
    pub code_expiration_minutes: u32,
    pub reward_expiration_days: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    pub id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl From<customer_codes::Model> for IssuedCode {
    fn from(model: customer_codes::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            expires_at: model.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCode {
    pub id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub phone: String,
    pub current_stamps: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeValidation {
    #[serde(rename = "customerCode")]
    pub code: ValidatedCode,
    pub customer: CustomerSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampAdded {
    pub stamp: StampInfo,
    pub new_stamp_count: u64,
    pub reward_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRef {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRedeemed {
    pub redemption: RedemptionInfo,
    pub reward: RewardRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampRecord {
    pub id: Uuid,
    pub status: StampStatus,
    pub created_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl From<stamps::Model> for StampRecord {
    fn from(model: stamps::Model) -> Self {
        Self {
            id: model.id,
            status: model.status,
            created_at: model.created_at,
            redeemed_at: model.redeemed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    pub status: RewardStatus,
    pub stamps_used: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<rewards::Model> for RewardRecord {
    fn from(model: rewards::Model) -> Self {
        Self {
            id: model.id,
            reward_type: model.reward_type,
            status: model.status,
            stamps_used: model.stamps_used,
            created_at: model.created_at,
            expires_at: model.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub id: Uuid,
    pub reward_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<redemptions::Model> for RedemptionRecord {
    fn from(model: redemptions::Model) -> Self {
        Self {
            id: model.id,
            reward_id: model.reward_id,
            notes: model.notes,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampProgress {
    pub current: u64,
    pub required: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUser {
    pub id: Uuid,
    pub phone: String,
    pub name: Option<String>,
}

/// Customer home screen snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user: DashboardUser,
    pub stamps: StampProgress,
    pub rewards: Vec<RewardRecord>,
    pub active_customer_code: Option<IssuedCode>,
}

/// Domain service trait for the loyalty engine.
///
/// Every operation takes the acting identity explicitly and re-reads the
/// persisted state it depends on.
#[async_trait::async_trait]
pub trait LoyaltyService: Send + Sync {
    /// Returns the customer's live code, or creates one.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::ForbiddenRole`] unless the actor is a customer.
    async fn issue_code(&self, actor: &Actor) -> Result<IssuedCode, LoyaltyError>;

    /// Staff-side check of a code value. Does not consume the code.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::CodeExpired`] (after persisting EXPIRED) when
    /// the code is past its expiry.
    async fn validate_code(
        &self,
        actor: &Actor,
        code: &str,
    ) -> Result<CodeValidation, LoyaltyError>;

    /// Consumes a code, records a stamp, and issues a reward when the
    /// threshold policy fires.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::CodeAlreadyUsed`] when the code was consumed
    /// already, including by a concurrent call.
    async fn add_stamp(&self, actor: &Actor, code_id: Uuid) -> Result<StampAdded, LoyaltyError>;

    /// Redeems one of the actor's available rewards.
    ///
    /// # Errors
    ///
    /// Returns [`LoyaltyError::RewardNotAvailable`] when the reward is not
    /// AVAILABLE, [`LoyaltyError::RewardExpired`] when it just expired.
    async fn redeem_reward(
        &self,
        actor: &Actor,
        reward_id: Uuid,
        notes: Option<String>,
    ) -> Result<RewardRedeemed, LoyaltyError>;

    /// Tunables in effect right now.
    async fn settings(&self) -> Result<LoyaltySettings, LoyaltyError>;

    async fn dashboard(&self, actor: &Actor) -> Result<Dashboard, LoyaltyError>;

    async fn stamp_history(&self, actor: &Actor) -> Result<Vec<StampRecord>, LoyaltyError>;

    async fn rewards(&self, actor: &Actor) -> Result<Vec<RewardRecord>, LoyaltyError>;

    async fn redemption_history(
        &self,
        actor: &Actor,
    ) -> Result<Vec<RedemptionRecord>, LoyaltyError>;
}

#[must_use]
pub(crate) const fn code_status_label(status: CodeStatus) -> &'static str {
    match status {
        CodeStatus::Active => "active",
        CodeStatus::Expired => "expired",
        CodeStatus::Used => "used",
    }
}
