//! Audit events emitted after state-changing operations.
//!
//! Each variant carries the fields recorded in the entry's JSON details.
//! Services build an [`AuditEvent`] and hand it to an
//! [`AuditSink`](crate::services::AuditSink) once their writes have
//! committed.

use serde::Serialize;
use uuid::Uuid;

use super::{RequestMeta, RewardType};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "action", content = "details", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserRegistered {
        phone: String,
    },
    UserLogin {
        phone: String,
    },
    PasswordChanged {
        phone: String,
    },
    ApiKeyRegenerated {
        phone: String,
    },
    #[serde(rename_all = "camelCase")]
    CustomerCodeGenerated {
        code: String,
    },
    #[serde(rename_all = "camelCase")]
    StampAdded {
        stamp_id: Uuid,
        customer_code_id: Uuid,
        manager_id: Uuid,
        new_stamps_count: u64,
    },
    #[serde(rename_all = "camelCase")]
    RewardCreated {
        reward_id: Uuid,
        reward_type: RewardType,
        stamps_used: u32,
    },
    #[serde(rename_all = "camelCase")]
    RewardRedeemed {
        reward_id: Uuid,
        reward_type: RewardType,
        redemption_id: Uuid,
    },
}

impl AuditAction {
    /// The tag stored in the `action` column.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "USER_REGISTERED",
            Self::UserLogin { .. } => "USER_LOGIN",
            Self::PasswordChanged { .. } => "PASSWORD_CHANGED",
            Self::ApiKeyRegenerated { .. } => "API_KEY_REGENERATED",
            Self::CustomerCodeGenerated { .. } => "CUSTOMER_CODE_GENERATED",
            Self::StampAdded { .. } => "STAMP_ADDED",
            Self::RewardCreated { .. } => "REWARD_CREATED",
            Self::RewardRedeemed { .. } => "REWARD_REDEEMED",
        }
    }

    /// The JSON object stored in the `details` column.
    #[must_use]
    pub fn details(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut value| value.get_mut("details").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }
}

/// A single audit record: who, what, and from where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEvent {
    /// Subject of the entry. For stamps and rewards this is the customer,
    /// not the staff member who triggered the change.
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub meta: RequestMeta,
}

impl AuditEvent {
    #[must_use]
    pub const fn new(user_id: Uuid, action: AuditAction, meta: RequestMeta) -> Self {
        Self {
            user_id: Some(user_id),
            action,
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_added_details_shape() {
        let stamp_id = Uuid::new_v4();
        let action = AuditAction::StampAdded {
            stamp_id,
            customer_code_id: Uuid::new_v4(),
            manager_id: Uuid::new_v4(),
            new_stamps_count: 4,
        };

        assert_eq!(action.tag(), "STAMP_ADDED");

        let details = action.details();
        assert_eq!(details["stampId"], serde_json::json!(stamp_id));
        assert_eq!(details["newStampsCount"], 4);
    }

    #[test]
    fn test_reward_created_details_shape() {
        let action = AuditAction::RewardCreated {
            reward_id: Uuid::new_v4(),
            reward_type: RewardType::GyozaFree,
            stamps_used: 10,
        };

        let details = action.details();
        assert_eq!(details["rewardType"], "GYOZA_FREE");
        assert_eq!(details["stampsUsed"], 10);
    }
}
