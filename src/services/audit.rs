//! Destination for audit events.
//!
//! The engine publishes an [`AuditEvent`] after every committed state
//! change. The default sink appends to the `audit_logs` table; a failed
//! append is logged and dropped because the change it describes has already
//! been committed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clock::Clock;
use crate::db::Store;
use crate::domain::events::AuditEvent;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

pub struct StoreAuditSink {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl StoreAuditSink {
    #[must_use]
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.store.add_audit_log(&event, self.clock.now()).await {
            warn!(
                action = event.action.tag(),
                user_id = ?event.user_id,
                error = %e,
                "Failed to write audit log"
            );
        }
    }
}
