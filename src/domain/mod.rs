//! Domain types for the loyalty program.
//!
//! Roles, capabilities, the acting identity passed into every engine
//! operation, and the one-time code value type.

pub mod events;
pub mod policy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use crate::entities::sea_orm_active_enums::{
    CodeStatus, RewardStatus, RewardType, StampStatus, UserRole,
};

/// Lowest value a customer code can take.
pub const CODE_MIN: u32 = 100_000;

/// Highest value a customer code can take.
pub const CODE_MAX: u32 = 999_999;

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    IssueCode,
    ValidateCode,
    AddStamp,
    RedeemReward,
}

impl UserRole {
    /// Returns true if a user holding this role may perform `capability`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kinton::domain::{Capability, UserRole};
    ///
    /// assert!(UserRole::Customer.has_capability(Capability::IssueCode));
    /// assert!(!UserRole::Customer.has_capability(Capability::AddStamp));
    /// assert!(UserRole::Manager.has_capability(Capability::ValidateCode));
    /// ```
    #[must_use]
    pub const fn has_capability(self, capability: Capability) -> bool {
        match capability {
            Capability::IssueCode | Capability::RedeemReward => matches!(self, Self::Customer),
            Capability::ValidateCode | Capability::AddStamp => {
                matches!(self, Self::Manager | Self::Admin)
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Manager => "MANAGER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request metadata recorded alongside audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// The authenticated identity performing an operation.
///
/// Handlers build this from the request and hand it to the engine
/// explicitly; nothing in the service layer reads ambient request state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
    pub meta: RequestMeta,
}

impl Actor {
    #[must_use]
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id,
            role,
            meta: RequestMeta::default(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub const fn can(&self, capability: Capability) -> bool {
        self.role.has_capability(capability)
    }
}

/// A 6-digit customer code value.
///
/// # Examples
///
/// ```rust
/// use kinton::domain::CodeValue;
///
/// assert!(CodeValue::parse("123456").is_some());
/// assert!(CodeValue::parse("012345").is_none());
/// assert!(CodeValue::parse("12a456").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeValue(String);

impl CodeValue {
    /// Draws a uniformly random value in `[CODE_MIN, CODE_MAX]`.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;

        let value: u32 = rand::rng().random_range(CODE_MIN..=CODE_MAX);
        Self(value.to_string())
    }

    /// Accepts exactly six ASCII digits within the issuable range.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != 6 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let value: u32 = trimmed.parse().ok()?;
        (CODE_MIN..=CODE_MAX)
            .contains(&value)
            .then(|| Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness check shared by codes and rewards: a record is expired once
/// `now` is strictly past its expiry instant.
#[must_use]
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}
