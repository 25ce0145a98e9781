//! Reward threshold policy.
//!
//! The active-stamp count is a running total that accrual never decrements,
//! so "when does a stamp earn a reward" is a product decision rather than an
//! arithmetic fact. The comparison lives behind [`RewardPolicy`] so it can be
//! changed without touching the accrual flow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub trait RewardPolicy: Send + Sync + fmt::Debug {
    /// Decides whether the stamp that brought the customer to
    /// `active_stamps` should also produce a reward.
    fn should_issue(&self, active_stamps: u64, stamps_for_reward: u32) -> bool;
}

/// Fires whenever the count is at or above the threshold. Once a customer
/// crosses the threshold, every further stamp issues another reward.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtOrAbove;

impl RewardPolicy for AtOrAbove {
    fn should_issue(&self, active_stamps: u64, stamps_for_reward: u32) -> bool {
        active_stamps >= u64::from(stamps_for_reward)
    }
}

/// Fires only when the count lands on an exact multiple of the threshold
/// (10, 20, 30, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryMultiple;

impl RewardPolicy for EveryMultiple {
    fn should_issue(&self, active_stamps: u64, stamps_for_reward: u32) -> bool {
        let threshold = u64::from(stamps_for_reward);
        threshold > 0 && active_stamps > 0 && active_stamps % threshold == 0
    }
}

/// Config-facing selector for the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    AtOrAbove,
    EveryMultiple,
}

impl PolicyKind {
    #[must_use]
    pub fn build(self) -> Arc<dyn RewardPolicy> {
        match self {
            Self::AtOrAbove => Arc::new(AtOrAbove),
            Self::EveryMultiple => Arc::new(EveryMultiple),
        }
    }
}
