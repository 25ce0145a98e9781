use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use kinton::clock::{Clock, ManualClock};
use kinton::config::{LoyaltyConfig, SecurityConfig};
use kinton::db::{CodeInsert, NewUser, Store, SystemSettings};
use kinton::domain::policy::PolicyKind;
use kinton::domain::{Actor, CodeStatus, CodeValue, RewardStatus, UserRole};
use kinton::services::{
    AuditSink, LoyaltyError, LoyaltyService, SeaOrmLoyaltyService, StoreAuditSink,
};
use uuid::Uuid;

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn fast_security() -> SecurityConfig {
    SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
    }
}

struct Harness {
    store: Store,
    clock: ManualClock,
    loyalty: Arc<dyn LoyaltyService>,
    customer: Actor,
    manager: Actor,
}

impl Harness {
    async fn new(loyalty: LoyaltyConfig) -> Self {
        let store = Store::new("sqlite::memory:").await.unwrap();
        Self::with_store(store, loyalty).await
    }

    async fn with_store(store: Store, loyalty: LoyaltyConfig) -> Self {
        let clock = ManualClock::new(start_time());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let audit: Arc<dyn AuditSink> =
            Arc::new(StoreAuditSink::new(store.clone(), Arc::clone(&shared_clock)));

        let service = SeaOrmLoyaltyService::new(
            store.clone(),
            shared_clock,
            loyalty.reward_policy.build(),
            loyalty,
            audit,
        );

        let customer = create_user(&store, "5510000001", UserRole::Customer).await;
        let manager = create_user(&store, "5510000002", UserRole::Manager).await;

        Self {
            store,
            clock,
            loyalty: Arc::new(service),
            customer,
            manager,
        }
    }

    async fn other_customer(&self) -> Actor {
        create_user(&self.store, "5510000003", UserRole::Customer).await
    }

    /// A second engine over the same store whose generator always yields `value`.
    fn service_issuing(
        &self,
        value: &'static str,
        loyalty: LoyaltyConfig,
    ) -> SeaOrmLoyaltyService {
        let clock: Arc<dyn Clock> = Arc::new(self.clock.clone());
        let audit: Arc<dyn AuditSink> =
            Arc::new(StoreAuditSink::new(self.store.clone(), Arc::clone(&clock)));

        SeaOrmLoyaltyService::new(
            self.store.clone(),
            clock,
            loyalty.reward_policy.build(),
            loyalty,
            audit,
        )
        .with_code_source(Arc::new(move || {
            CodeValue::parse(value).expect("fixed code value")
        }))
    }

    /// Issue a code for the customer and stamp it.
    async fn stamp(&self) -> kinton::services::StampAdded {
        let code = self.loyalty.issue_code(&self.customer).await.unwrap();
        self.loyalty.add_stamp(&self.manager, code.id).await.unwrap()
    }
}

async fn create_user(store: &Store, phone: &str, role: UserRole) -> Actor {
    let user = store
        .create_user(
            NewUser {
                phone: phone.to_string(),
                password: "secret123".to_string(),
                name: Some("Test User".to_string()),
                role,
            },
            &fast_security(),
            start_time(),
        )
        .await
        .unwrap();

    Actor::new(user.id, user.role)
}

fn config_with_threshold(stamps_for_reward: u32, policy: PolicyKind) -> LoyaltyConfig {
    LoyaltyConfig {
        stamps_for_reward,
        reward_policy: policy,
        ..LoyaltyConfig::default()
    }
}

// ============================================================================
// Code issuance
// ============================================================================

#[tokio::test]
async fn test_issue_code_is_idempotent_while_live() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    let first = h.loyalty.issue_code(&h.customer).await.unwrap();
    assert_eq!(first.code.len(), 6);
    assert_eq!(first.expires_at, start_time() + Duration::minutes(60));

    h.clock.advance(Duration::minutes(30));
    let second = h.loyalty.issue_code(&h.customer).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.code, second.code);
    assert_eq!(first.expires_at, second.expires_at);

    let active = h.store.list_active_codes(h.customer.user_id).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_issue_code_replaces_expired_code() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    let first = h.loyalty.issue_code(&h.customer).await.unwrap();

    h.clock.advance(Duration::minutes(61));
    let second = h.loyalty.issue_code(&h.customer).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(
        second.expires_at,
        start_time() + Duration::minutes(61) + Duration::minutes(60)
    );

    let old = h.store.get_code(first.id).await.unwrap().unwrap();
    assert_eq!(old.status, CodeStatus::Expired);

    let active = h.store.list_active_codes(h.customer.user_id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
}

#[tokio::test]
async fn test_issue_code_requires_customer() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    let err = h.loyalty.issue_code(&h.manager).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::ForbiddenRole(_)));
    assert_eq!(err.kind(), "FORBIDDEN_ROLE");
}

#[tokio::test]
async fn test_issue_code_audits_only_new_codes() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    h.loyalty.issue_code(&h.customer).await.unwrap();
    h.loyalty.issue_code(&h.customer).await.unwrap();

    let logs = h.store.list_audit_logs(h.customer.user_id).await.unwrap();
    let generated = logs
        .iter()
        .filter(|l| l.action == "CUSTOMER_CODE_GENERATED")
        .count();
    assert_eq!(generated, 1);
}

#[tokio::test]
async fn test_issue_code_uses_database_ttl() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    h.store
        .save_system_settings(
            SystemSettings {
                stamps_for_reward: 10,
                code_expiration_minutes: 5,
                reward_expiration_days: 30,
                is_maintenance_mode: false,
            },
            start_time(),
        )
        .await
        .unwrap();

    let code = h.loyalty.issue_code(&h.customer).await.unwrap();
    assert_eq!(code.expires_at, start_time() + Duration::minutes(5));
}

#[tokio::test]
async fn test_code_value_unique_among_active_codes() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let other = h.other_customer().await;
    let value = CodeValue::parse("482913").unwrap();
    let now = start_time();
    let expires_at = now + Duration::minutes(60);

    let CodeInsert::Inserted(first) = h
        .store
        .insert_code(h.customer.user_id, &value, expires_at, now)
        .await
        .unwrap()
    else {
        panic!("first insert should succeed");
    };

    let clash = h
        .store
        .insert_code(other.user_id, &value, expires_at, now)
        .await
        .unwrap();
    assert!(matches!(clash, CodeInsert::Conflict));

    // Terminal codes release their value
    assert!(h.store.expire_code(first.id).await.unwrap());

    let CodeInsert::Inserted(second) = h
        .store
        .insert_code(other.user_id, &value, expires_at, now)
        .await
        .unwrap()
    else {
        panic!("value should be free once the first code expired");
    };
    assert_eq!(second.code, "482913");

    let found = h.store.get_code_by_value("482913").await.unwrap().unwrap();
    assert_eq!(found.id, second.id);
}

#[tokio::test]
async fn test_issue_code_exhausts_attempts_on_value_collision() {
    let loyalty = LoyaltyConfig {
        max_code_generation_attempts: 3,
        ..LoyaltyConfig::default()
    };
    let h = Harness::new(loyalty.clone()).await;
    let other = h.other_customer().await;
    let fixed = h.service_issuing("777777", loyalty);

    let held = fixed.issue_code(&h.customer).await.unwrap();
    assert_eq!(held.code, "777777");

    let err = fixed.issue_code(&other).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeSpaceExhausted));
    assert!(h.store.list_active_codes(other.user_id).await.unwrap().is_empty());

    // Once the holder's code is USED the value can be issued again
    h.loyalty.add_stamp(&h.manager, held.id).await.unwrap();

    let reissued = fixed.issue_code(&other).await.unwrap();
    assert_eq!(reissued.code, "777777");
    assert_ne!(reissued.id, held.id);
}

#[tokio::test]
async fn test_issue_code_with_zero_attempts_fails() {
    let h = Harness::new(LoyaltyConfig {
        max_code_generation_attempts: 0,
        ..LoyaltyConfig::default()
    })
    .await;

    let err = h.loyalty.issue_code(&h.customer).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeSpaceExhausted));
    assert_eq!(err.kind(), "STORAGE_ERROR");
}

// ============================================================================
// Code validation
// ============================================================================

#[tokio::test]
async fn test_validate_code_does_not_consume() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    for _ in 0..2 {
        let validation = h
            .loyalty
            .validate_code(&h.manager, &code.code)
            .await
            .unwrap();
        assert_eq!(validation.code.id, code.id);
        assert_eq!(validation.customer.id, h.customer.user_id);
        assert_eq!(validation.customer.phone, "5510000001");
        assert_eq!(validation.customer.current_stamps, 0);
    }

    let row = h.store.get_code(code.id).await.unwrap().unwrap();
    assert_eq!(row.status, CodeStatus::Active);
}

#[tokio::test]
async fn test_validate_code_requires_staff() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    let err = h
        .loyalty
        .validate_code(&h.customer, &code.code)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::ForbiddenRole(_)));
}

#[tokio::test]
async fn test_validate_unknown_code() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    let err = h
        .loyalty
        .validate_code(&h.manager, "123456")
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::NotFound(_)));
}

#[tokio::test]
async fn test_validate_expired_code_persists_expired() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    h.clock.advance(Duration::minutes(61));

    let err = h
        .loyalty
        .validate_code(&h.manager, &code.code)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeExpired));

    let row = h.store.get_code(code.id).await.unwrap().unwrap();
    assert_eq!(row.status, CodeStatus::Expired);

    // Terminal: rewinding the clock does not bring it back.
    h.clock.set(start_time());
    let err = h
        .loyalty
        .validate_code(&h.manager, &code.code)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeInactive));
}

#[tokio::test]
async fn test_validate_code_at_exact_expiry_is_live() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    h.clock.set(code.expires_at);

    assert!(
        h.loyalty
            .validate_code(&h.manager, &code.code)
            .await
            .is_ok()
    );
}

// ============================================================================
// Stamp accrual
// ============================================================================

#[tokio::test]
async fn test_add_stamp_consumes_code() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    let added = h.loyalty.add_stamp(&h.manager, code.id).await.unwrap();
    assert_eq!(added.new_stamp_count, 1);
    assert!(!added.reward_created);

    let row = h.store.get_code(code.id).await.unwrap().unwrap();
    assert_eq!(row.status, CodeStatus::Used);
    assert_eq!(row.used_at, Some(start_time()));

    let stamp = h.store.get_stamp_by_code(code.id).await.unwrap().unwrap();
    assert_eq!(stamp.id, added.stamp.id);
    assert_eq!(stamp.user_id, h.customer.user_id);
    assert_eq!(stamp.created_by_id, h.manager.user_id);

    let err = h.loyalty.add_stamp(&h.manager, code.id).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeAlreadyUsed));

    let err = h
        .loyalty
        .validate_code(&h.manager, &code.code)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeInactive));
}

#[tokio::test]
async fn test_add_stamp_on_expired_code() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    h.clock.advance(Duration::minutes(61));

    let err = h.loyalty.add_stamp(&h.manager, code.id).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeExpired));

    let row = h.store.get_code(code.id).await.unwrap().unwrap();
    assert_eq!(row.status, CodeStatus::Expired);

    let err = h.loyalty.add_stamp(&h.manager, code.id).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::CodeInactive));

    assert_eq!(
        h.store
            .count_active_stamps(h.customer.user_id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_add_stamp_requires_staff_and_existing_code() {
    let h = Harness::new(LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    let err = h.loyalty.add_stamp(&h.customer, code.id).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::ForbiddenRole(_)));

    let err = h
        .loyalty
        .add_stamp(&h.manager, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::NotFound(_)));
}

#[tokio::test]
async fn test_add_stamp_writes_audit_entries() {
    let h = Harness::new(config_with_threshold(1, PolicyKind::AtOrAbove)).await;
    let added = h.stamp().await;
    assert!(added.reward_created);

    let logs = h.store.list_audit_logs(h.customer.user_id).await.unwrap();
    let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
    assert!(actions.contains(&"STAMP_ADDED"));
    assert!(actions.contains(&"REWARD_CREATED"));

    let stamp_entry = logs.iter().find(|l| l.action == "STAMP_ADDED").unwrap();
    let details = stamp_entry.details.as_ref().unwrap();
    assert_eq!(details["newStampsCount"], 1);
    assert_eq!(
        details["managerId"],
        serde_json::json!(h.manager.user_id)
    );
}

// ============================================================================
// Threshold rewards
// ============================================================================

#[tokio::test]
async fn test_tenth_stamp_issues_reward() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    for expected in 1..=9 {
        let added = h.stamp().await;
        assert_eq!(added.new_stamp_count, expected);
        assert!(!added.reward_created, "stamp {expected} must not reward");
    }

    let tenth = h.stamp().await;
    assert_eq!(tenth.new_stamp_count, 10);
    assert!(tenth.reward_created);

    let rewards = h.loyalty.rewards(&h.customer).await.unwrap();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].status, RewardStatus::Available);
    assert_eq!(rewards[0].stamps_used, 10);
    assert_eq!(
        rewards[0].expires_at,
        Some(start_time() + Duration::days(30))
    );
}

#[tokio::test]
async fn test_eleventh_stamp_with_at_or_above_policy() {
    let h = Harness::new(config_with_threshold(10, PolicyKind::AtOrAbove)).await;

    for _ in 0..10 {
        h.stamp().await;
    }

    let eleventh = h.stamp().await;
    assert_eq!(eleventh.new_stamp_count, 11);
    assert!(eleventh.reward_created);
    assert_eq!(h.loyalty.rewards(&h.customer).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_eleventh_stamp_with_every_multiple_policy() {
    let h = Harness::new(config_with_threshold(10, PolicyKind::EveryMultiple)).await;

    for _ in 0..10 {
        h.stamp().await;
    }

    let eleventh = h.stamp().await;
    assert_eq!(eleventh.new_stamp_count, 11);
    assert!(!eleventh.reward_created);
    assert_eq!(h.loyalty.rewards(&h.customer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_database_threshold_overrides_config() {
    let h = Harness::new(LoyaltyConfig::default()).await;

    h.store
        .save_system_settings(
            SystemSettings {
                stamps_for_reward: 2,
                code_expiration_minutes: 60,
                reward_expiration_days: 7,
                is_maintenance_mode: false,
            },
            start_time(),
        )
        .await
        .unwrap();

    assert!(!h.stamp().await.reward_created);
    assert!(h.stamp().await.reward_created);

    let rewards = h.loyalty.rewards(&h.customer).await.unwrap();
    assert_eq!(rewards[0].stamps_used, 2);
    assert_eq!(rewards[0].expires_at, Some(start_time() + Duration::days(7)));

    let dashboard = h.loyalty.dashboard(&h.customer).await.unwrap();
    assert_eq!(dashboard.stamps.current, 2);
    assert_eq!(dashboard.stamps.required, 2);
    assert_eq!(dashboard.rewards.len(), 1);
}

// ============================================================================
// Redemption
// ============================================================================

async fn earn_reward(h: &Harness) -> Uuid {
    let added = h.stamp().await;
    assert!(added.reward_created);
    added.reward_id.unwrap()
}

#[tokio::test]
async fn test_redeem_reward_once() {
    let h = Harness::new(config_with_threshold(1, PolicyKind::AtOrAbove)).await;
    let reward_id = earn_reward(&h).await;

    let redeemed = h
        .loyalty
        .redeem_reward(&h.customer, reward_id, Some("table 4".to_string()))
        .await
        .unwrap();
    assert_eq!(redeemed.reward.id, reward_id);

    let reward = h.store.get_reward(reward_id).await.unwrap().unwrap();
    assert_eq!(reward.status, RewardStatus::Redeemed);

    let err = h
        .loyalty
        .redeem_reward(&h.customer, reward_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::RewardNotAvailable));

    let history = h.loyalty.redemption_history(&h.customer).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, redeemed.redemption.id);
    assert_eq!(history[0].notes.as_deref(), Some("table 4"));
}

#[tokio::test]
async fn test_redeem_reward_access_rules() {
    let h = Harness::new(config_with_threshold(1, PolicyKind::AtOrAbove)).await;
    let reward_id = earn_reward(&h).await;

    let err = h
        .loyalty
        .redeem_reward(&h.manager, reward_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::ForbiddenRole(_)));

    let other = h.other_customer().await;
    let err = h
        .loyalty
        .redeem_reward(&other, reward_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::Forbidden(_)));

    let err = h
        .loyalty
        .redeem_reward(&h.customer, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::NotFound(_)));

    let reward = h.store.get_reward(reward_id).await.unwrap().unwrap();
    assert_eq!(reward.status, RewardStatus::Available);
}

#[tokio::test]
async fn test_redeem_expired_reward() {
    let h = Harness::new(config_with_threshold(1, PolicyKind::AtOrAbove)).await;
    let reward_id = earn_reward(&h).await;

    h.clock.advance(Duration::days(31));

    let err = h
        .loyalty
        .redeem_reward(&h.customer, reward_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::RewardExpired));

    let reward = h.store.get_reward(reward_id).await.unwrap().unwrap();
    assert_eq!(reward.status, RewardStatus::Expired);

    let err = h
        .loyalty
        .redeem_reward(&h.customer, reward_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::RewardNotAvailable));
}

// ============================================================================
// Concurrency
// ============================================================================

async fn file_store(dir: &tempfile::TempDir) -> Store {
    let path = dir.path().join("kinton.db");
    Store::with_pool_options(&format!("sqlite:{}", path.display()), 8, 1)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_stamp_consumes_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::with_store(file_store(&dir).await, LoyaltyConfig::default()).await;
    let code = h.loyalty.issue_code(&h.customer).await.unwrap();

    let tasks = (0..8).map(|_| {
        let loyalty = Arc::clone(&h.loyalty);
        let manager = h.manager.clone();
        tokio::spawn(async move { loyalty.add_stamp(&manager, code.id).await })
    });

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already_used = results
        .iter()
        .filter(|r| matches!(r, Err(LoyaltyError::CodeAlreadyUsed)))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(already_used, 7);
    assert_eq!(
        h.store
            .count_active_stamps(h.customer.user_id)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issue_code_yields_single_active_code() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::with_store(file_store(&dir).await, LoyaltyConfig::default()).await;

    let tasks = (0..6).map(|_| {
        let loyalty = Arc::clone(&h.loyalty);
        let customer = h.customer.clone();
        tokio::spawn(async move { loyalty.issue_code(&customer).await })
    });

    let codes: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert!(codes.iter().all(|c| c.id == codes[0].id));

    let active = h.store.list_active_codes(h.customer.user_id).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redeem_succeeds_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::with_store(
        file_store(&dir).await,
        config_with_threshold(1, PolicyKind::AtOrAbove),
    )
    .await;
    let reward_id = earn_reward(&h).await;

    let tasks = (0..6).map(|_| {
        let loyalty = Arc::clone(&h.loyalty);
        let customer = h.customer.clone();
        tokio::spawn(async move { loyalty.redeem_reward(&customer, reward_id, None).await })
    });

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(LoyaltyError::RewardNotAvailable)))
    );
    assert_eq!(
        h.loyalty
            .redemption_history(&h.customer)
            .await
            .unwrap()
            .len(),
        1
    );
}
