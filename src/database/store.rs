use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::audit::{AuditEntry, AuditQuery};
use crate::database::{CommitReceipt, WriteBatch};
use crate::model::{DemandSignal, Engagement, Expert, SupplyProfile, Ticket, User};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A batch guard no longer holds, or a uniqueness rule was hit
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Minimal row used by the decay dashboard.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ExpiringExpert {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
    pub private_expires_at: DateTime<Utc>,
}

/// Persistence collaborator for the governance engine.
///
/// Reads are plain snapshots. Every mutation goes through [`commit`], which is
/// atomic across all entities it touches.
///
/// [`commit`]: GovernanceStore::commit
#[async_trait]
pub trait GovernanceStore: Send + Sync {
    async fn get_expert(&self, expert_id: &str) -> StoreResult<Option<Expert>>;

    async fn get_experts(&self, expert_ids: &[String]) -> StoreResult<Vec<Expert>>;

    /// PRIVATE experts whose expiry falls in `(after, until]`; `after = None` is unbounded.
    async fn count_private_expiring(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// PRIVATE experts ordered by soonest expiry.
    async fn list_private_by_expiry(&self, limit: usize) -> StoreResult<Vec<ExpiringExpert>>;

    /// PRIVATE experts expired at `now` that have no verified contact.
    async fn find_expired_private(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Expert>>;

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>>;

    async fn get_ticket(&self, ticket_id: &str) -> StoreResult<Option<Ticket>>;

    async fn tickets_for_expert(&self, expert_id: &str) -> StoreResult<Vec<Ticket>>;

    async fn open_tickets(&self, limit: usize) -> StoreResult<Vec<Ticket>>;

    async fn count_contact_attempts(
        &self,
        expert_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn count_engagements(&self, expert_id: &str, since: DateTime<Utc>) -> StoreResult<u64>;

    /// Distinct experts with at least one contact attempt since `since`.
    async fn experts_contacted_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<String>>;

    async fn engagements_for_expert(&self, expert_id: &str) -> StoreResult<Vec<Engagement>>;

    async fn pool_supply(&self) -> StoreResult<Vec<SupplyProfile>>;

    /// PENDING and RUNNING demand signals, oldest first.
    async fn active_demand_signals(&self) -> StoreResult<Vec<DemandSignal>>;

    async fn get_demand_signal(&self, signal_id: &str) -> StoreResult<Option<DemandSignal>>;

    async fn get_config(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Newest-first audit read.
    async fn query_audit(&self, query: &AuditQuery, limit: usize) -> StoreResult<Vec<AuditEntry>>;

    /// Apply a guarded batch atomically.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt>;
}
