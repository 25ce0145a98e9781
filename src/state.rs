use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuditSink, AuthService, LoyaltyService, SeaOrmAuthService, SeaOrmLoyaltyService,
    StoreAuditSink,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub loyalty: Arc<dyn LoyaltyService>,

    pub auth: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Opens the configured database and wires services against `clock`.
    pub async fn with_clock(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self::from_parts(config, store, clock))
    }

    #[must_use]
    pub fn from_parts(config: Config, store: Store, clock: Arc<dyn Clock>) -> Self {
        let audit: Arc<dyn AuditSink> =
            Arc::new(StoreAuditSink::new(store.clone(), Arc::clone(&clock)));

        let loyalty: Arc<dyn LoyaltyService> = Arc::new(SeaOrmLoyaltyService::new(
            store.clone(),
            Arc::clone(&clock),
            config.loyalty.reward_policy.build(),
            config.loyalty.clone(),
            Arc::clone(&audit),
        ));

        let auth: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
            clock,
            audit,
        ));

        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            loyalty,
            auth,
        }
    }
}
