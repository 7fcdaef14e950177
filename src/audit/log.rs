use std::sync::Arc;

use crate::audit::{AuditAction, AuditEntry, AuditQuery, AuditSeverity};
use crate::database::GovernanceStore;
use crate::error::GovernanceResult;

/// Read side of the append-only audit log, plus the tracing mirror.
///
/// Rows are appended inside the same store commit as the mutation they
/// describe; this type never writes on its own.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn GovernanceStore>,
    max_limit: usize,
}

impl AuditLog {
    pub fn new(store: Arc<dyn GovernanceStore>, max_limit: usize) -> Self {
        Self { store, max_limit }
    }

    /// Mirror committed rows into the tracing log at their severity.
    pub fn emit(&self, entries: &[AuditEntry]) {
        for entry in entries {
            match entry.action.severity() {
                AuditSeverity::Info => tracing::info!(
                    action = %entry.action,
                    actor_id = ?entry.actor_id,
                    target_id = ?entry.target_id,
                    "AUDIT"
                ),
                AuditSeverity::Warning => tracing::warn!(
                    action = %entry.action,
                    actor_id = ?entry.actor_id,
                    target_id = ?entry.target_id,
                    metadata = ?entry.metadata,
                    "AUDIT"
                ),
            }
        }
    }

    /// Newest-first filtered read, limit defaulted to 100 and capped.
    pub async fn query(&self, query: &AuditQuery) -> GovernanceResult<Vec<AuditEntry>> {
        let limit = query.effective_limit(self.max_limit);
        Ok(self.store.query_audit(query, limit).await?)
    }

    pub async fn recent(&self, action: AuditAction, count: usize) -> GovernanceResult<Vec<AuditEntry>> {
        self.query(&AuditQuery::for_action(action, count)).await
    }
}
