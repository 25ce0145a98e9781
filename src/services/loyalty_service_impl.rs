//! `SeaORM` implementation of the `LoyaltyService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::LoyaltyConfig;
use crate::db::{Accrual, CodeInsert, Redeem, RewardGrant, Store, SystemSettings};
use crate::domain::events::{AuditAction, AuditEvent};
use crate::domain::policy::RewardPolicy;
use crate::domain::{Actor, Capability, CodeStatus, CodeValue, RewardStatus, is_expired};
use crate::entities::customer_codes;
use crate::services::audit::AuditSink;
use crate::services::loyalty_service::{
    CodeValidation, CustomerSummary, Dashboard, DashboardUser, IssuedCode, LoyaltyError,
    LoyaltyService, LoyaltySettings, RedemptionInfo, RedemptionRecord, RewardRecord, RewardRedeemed,
    RewardRef, StampAdded, StampInfo, StampProgress, StampRecord, ValidatedCode, code_status_label,
};

/// Source of candidate code values for issuance.
pub type CodeSource = Arc<dyn Fn() -> CodeValue + Send + Sync>;

pub struct SeaOrmLoyaltyService {
    store: Store,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn RewardPolicy>,
    defaults: LoyaltyConfig,
    audit: Arc<dyn AuditSink>,
    code_source: CodeSource,
}

impl SeaOrmLoyaltyService {
    #[must_use]
    pub fn new(
        store: Store,
        clock: Arc<dyn Clock>,
        policy: Arc<dyn RewardPolicy>,
        defaults: LoyaltyConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            defaults,
            audit,
            code_source: Arc::new(CodeValue::generate),
        }
    }

    /// Replaces the random generator used for new code values.
    #[must_use]
    pub fn with_code_source(mut self, source: CodeSource) -> Self {
        self.code_source = source;
        self
    }

    async fn resolve_settings(&self) -> Result<LoyaltySettings, LoyaltyError> {
        let row = self.store.get_system_settings().await?;
        Ok(merge_settings(&self.defaults, row))
    }

    fn require(
        actor: &Actor,
        capability: Capability,
        action: &'static str,
    ) -> Result<(), LoyaltyError> {
        if actor.can(capability) {
            Ok(())
        } else {
            Err(LoyaltyError::ForbiddenRole(action))
        }
    }

    /// Persist EXPIRED for a code observed past its expiry.
    async fn expire_code(&self, code: &customer_codes::Model) -> Result<(), LoyaltyError> {
        if self.store.expire_code(code.id).await? {
            metrics::counter!("loyalty_lazy_expirations_total", "entity" => "customer_code")
                .increment(1);
            debug!(code_id = %code.id, "Customer code lazily expired");
        }
        Ok(())
    }
}

/// Database settings win when positive, otherwise the configured value.
fn merge_settings(defaults: &LoyaltyConfig, row: Option<SystemSettings>) -> LoyaltySettings {
    let pick = |db: Option<i32>, fallback: u32| {
        db.and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(fallback)
    };

    LoyaltySettings {
        stamps_for_reward: pick(row.map(|r| r.stamps_for_reward), defaults.stamps_for_reward),
        code_expiration_minutes: pick(
            row.map(|r| r.code_expiration_minutes),
            defaults.code_expiration_minutes,
        ),
        reward_expiration_days: pick(
            row.map(|r| r.reward_expiration_days),
            defaults.reward_expiration_days,
        ),
    }
}

#[async_trait]
impl LoyaltyService for SeaOrmLoyaltyService {
    async fn issue_code(&self, actor: &Actor) -> Result<IssuedCode, LoyaltyError> {
        Self::require(actor, Capability::IssueCode, "generate customer codes")?;

        let settings = self.resolve_settings().await?;

        for attempt in 1..=self.defaults.max_code_generation_attempts {
            let now = self.clock.now();

            let expired = self.store.expire_stale_codes(actor.user_id, now).await?;
            if expired > 0 {
                metrics::counter!("loyalty_lazy_expirations_total", "entity" => "customer_code")
                    .increment(expired);
            }

            if let Some(live) = self.store.find_live_code(actor.user_id, now).await? {
                debug!(user_id = %actor.user_id, code_id = %live.id, "Reusing live customer code");
                return Ok(IssuedCode::from(live));
            }

            let value = (self.code_source)();
            let expires_at = now + Duration::minutes(i64::from(settings.code_expiration_minutes));

            match self
                .store
                .insert_code(actor.user_id, &value, expires_at, now)
                .await?
            {
                CodeInsert::Inserted(code) => {
                    metrics::counter!("loyalty_codes_issued_total").increment(1);
                    info!(user_id = %actor.user_id, code_id = %code.id, "Customer code issued");

                    self.audit
                        .record(AuditEvent::new(
                            actor.user_id,
                            AuditAction::CustomerCodeGenerated {
                                code: code.code.clone(),
                            },
                            actor.meta.clone(),
                        ))
                        .await;

                    return Ok(IssuedCode::from(code));
                }
                // Either the value is held by another ACTIVE code or a
                // concurrent call for this customer won; the next pass
                // re-reads and reuses the winner if there is one.
                CodeInsert::Conflict => {
                    debug!(user_id = %actor.user_id, attempt, "Customer code insert conflicted");
                }
            }
        }

        warn!(user_id = %actor.user_id, "Exhausted customer code generation attempts");
        Err(LoyaltyError::CodeSpaceExhausted)
    }

    async fn validate_code(
        &self,
        actor: &Actor,
        code: &str,
    ) -> Result<CodeValidation, LoyaltyError> {
        Self::require(actor, Capability::ValidateCode, "validate customer codes")?;

        let value = CodeValue::parse(code).ok_or(LoyaltyError::NotFound("Customer code"))?;
        let code = self
            .store
            .get_code_by_value(value.as_str())
            .await?
            .ok_or(LoyaltyError::NotFound("Customer code"))?;

        if code.status != CodeStatus::Active {
            debug!(
                code_id = %code.id,
                status = code_status_label(code.status),
                "Validation of inactive code"
            );
            return Err(LoyaltyError::CodeInactive);
        }

        if is_expired(code.expires_at, self.clock.now()) {
            self.expire_code(&code).await?;
            return Err(LoyaltyError::CodeExpired);
        }

        if self.store.get_stamp_by_code(code.id).await?.is_some() {
            return Err(LoyaltyError::CodeAlreadyUsed);
        }

        let customer = self
            .store
            .get_user(code.user_id)
            .await?
            .ok_or(LoyaltyError::NotFound("Customer"))?;

        let current_stamps = self.store.count_active_stamps(customer.id).await?;

        Ok(CodeValidation {
            code: ValidatedCode {
                id: code.id,
                code: code.code,
                created_at: code.created_at,
            },
            customer: CustomerSummary {
                id: customer.id,
                name: customer.name,
                phone: customer.phone,
                current_stamps,
            },
        })
    }

    async fn add_stamp(&self, actor: &Actor, code_id: Uuid) -> Result<StampAdded, LoyaltyError> {
        Self::require(actor, Capability::AddStamp, "add stamps")?;

        let code = self
            .store
            .get_code(code_id)
            .await?
            .ok_or(LoyaltyError::NotFound("Customer code"))?;

        if code.status == CodeStatus::Used || self.store.get_stamp_by_code(code.id).await?.is_some()
        {
            return Err(LoyaltyError::CodeAlreadyUsed);
        }

        if code.status == CodeStatus::Expired {
            return Err(LoyaltyError::CodeInactive);
        }

        let now = self.clock.now();
        if is_expired(code.expires_at, now) {
            self.expire_code(&code).await?;
            return Err(LoyaltyError::CodeExpired);
        }

        let settings = self.resolve_settings().await?;
        let policy = Arc::clone(&self.policy);
        let reward_type = self.defaults.default_reward_type;
        let reward_expires_at = now + Duration::days(i64::from(settings.reward_expiration_days));
        let threshold = settings.stamps_for_reward;

        let accrual = self
            .store
            .accrue_stamp(&code, actor.user_id, now, move |count| {
                policy.should_issue(count, threshold).then(|| RewardGrant {
                    reward_type,
                    stamps_used: i32::try_from(threshold).unwrap_or(i32::MAX),
                    expires_at: Some(reward_expires_at),
                })
            })
            .await?;

        let (stamp, new_stamp_count, reward) = match accrual {
            Accrual::Accrued {
                stamp,
                new_stamp_count,
                reward,
            } => (stamp, new_stamp_count, reward),
            Accrual::AlreadyUsed => {
                // Lost the race. Report what the winner left behind.
                let current = self.store.get_code(code.id).await?;
                return Err(match current.map(|c| c.status) {
                    Some(CodeStatus::Expired) => LoyaltyError::CodeInactive,
                    _ => LoyaltyError::CodeAlreadyUsed,
                });
            }
        };

        metrics::counter!("loyalty_stamps_added_total").increment(1);
        info!(
            user_id = %code.user_id,
            code_id = %code.id,
            staff_id = %actor.user_id,
            stamp_count = new_stamp_count,
            "Stamp added"
        );

        if let Some(reward) = &reward {
            metrics::counter!("loyalty_rewards_issued_total").increment(1);
            info!(user_id = %code.user_id, reward_id = %reward.id, "Reward issued");

            self.audit
                .record(AuditEvent::new(
                    code.user_id,
                    AuditAction::RewardCreated {
                        reward_id: reward.id,
                        reward_type: reward.reward_type,
                        stamps_used: threshold,
                    },
                    actor.meta.clone(),
                ))
                .await;
        }

        self.audit
            .record(AuditEvent::new(
                code.user_id,
                AuditAction::StampAdded {
                    stamp_id: stamp.id,
                    customer_code_id: code.id,
                    manager_id: actor.user_id,
                    new_stamps_count: new_stamp_count,
                },
                actor.meta.clone(),
            ))
            .await;

        Ok(StampAdded {
            stamp: StampInfo {
                id: stamp.id,
                created_at: stamp.created_at,
            },
            new_stamp_count,
            reward_created: reward.is_some(),
            reward_id: reward.map(|r| r.id),
        })
    }

    async fn redeem_reward(
        &self,
        actor: &Actor,
        reward_id: Uuid,
        notes: Option<String>,
    ) -> Result<RewardRedeemed, LoyaltyError> {
        Self::require(actor, Capability::RedeemReward, "redeem rewards")?;

        let reward = self
            .store
            .get_reward(reward_id)
            .await?
            .ok_or(LoyaltyError::NotFound("Reward"))?;

        if reward.user_id != actor.user_id {
            return Err(LoyaltyError::Forbidden("reward"));
        }

        if reward.status != RewardStatus::Available {
            return Err(LoyaltyError::RewardNotAvailable);
        }

        let now = self.clock.now();
        if reward.expires_at.is_some_and(|at| is_expired(at, now)) {
            if self.store.expire_reward(reward.id).await? {
                metrics::counter!("loyalty_lazy_expirations_total", "entity" => "reward")
                    .increment(1);
                debug!(reward_id = %reward.id, "Reward lazily expired");
            }
            return Err(LoyaltyError::RewardExpired);
        }

        let redemption = match self
            .store
            .redeem_reward(&reward, actor.user_id, notes, now)
            .await?
        {
            Redeem::Redeemed(redemption) => redemption,
            Redeem::NotAvailable => return Err(LoyaltyError::RewardNotAvailable),
        };

        metrics::counter!("loyalty_rewards_redeemed_total").increment(1);
        info!(user_id = %actor.user_id, reward_id = %reward.id, "Reward redeemed");

        self.audit
            .record(AuditEvent::new(
                actor.user_id,
                AuditAction::RewardRedeemed {
                    reward_id: reward.id,
                    reward_type: reward.reward_type,
                    redemption_id: redemption.id,
                },
                actor.meta.clone(),
            ))
            .await;

        Ok(RewardRedeemed {
            redemption: RedemptionInfo {
                id: redemption.id,
                created_at: redemption.created_at,
            },
            reward: RewardRef {
                id: reward.id,
                reward_type: reward.reward_type,
            },
        })
    }

    async fn settings(&self) -> Result<LoyaltySettings, LoyaltyError> {
        self.resolve_settings().await
    }

    async fn dashboard(&self, actor: &Actor) -> Result<Dashboard, LoyaltyError> {
        let user = self
            .store
            .get_user(actor.user_id)
            .await?
            .ok_or(LoyaltyError::NotFound("User"))?;

        let settings = self.resolve_settings().await?;
        let current = self.store.count_active_stamps(user.id).await?;
        let rewards = self.store.list_available_rewards(user.id).await?;
        let live_code = self.store.find_live_code(user.id, self.clock.now()).await?;

        Ok(Dashboard {
            user: DashboardUser {
                id: user.id,
                phone: user.phone,
                name: user.name,
            },
            stamps: StampProgress {
                current,
                required: settings.stamps_for_reward,
            },
            rewards: rewards.into_iter().map(RewardRecord::from).collect(),
            active_customer_code: live_code.map(IssuedCode::from),
        })
    }

    async fn stamp_history(&self, actor: &Actor) -> Result<Vec<StampRecord>, LoyaltyError> {
        let stamps = self.store.list_stamps(actor.user_id).await?;
        Ok(stamps.into_iter().map(StampRecord::from).collect())
    }

    async fn rewards(&self, actor: &Actor) -> Result<Vec<RewardRecord>, LoyaltyError> {
        let rewards = self.store.list_rewards(actor.user_id).await?;
        Ok(rewards.into_iter().map(RewardRecord::from).collect())
    }

    async fn redemption_history(
        &self,
        actor: &Actor,
    ) -> Result<Vec<RedemptionRecord>, LoyaltyError> {
        let redemptions = self.store.list_redemptions(actor.user_id).await?;
        Ok(redemptions.into_iter().map(RedemptionRecord::from).collect())
    }
}
