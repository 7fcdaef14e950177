//! Visibility State Machine
//!
//! ```text
//!            release (expiry, force-expire)
//!   PRIVATE ─────────────────────────────────► GLOBAL_POOL
//!      ▲                                            │
//!      └────────────────────────────────────────────┘
//!            claim (bulk-reclaim, approval, no-spam demotion)
//! ```
//!
//! Every transition is planned against a snapshot and committed with a
//! visibility guard, so a stale snapshot surfaces as a conflict instead of
//! overwriting a concurrent change.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::audit::{AuditAppend, AuditLog};
use crate::database::{CommitReceipt, GovernanceStore, Guard, Write, WriteBatch};
use crate::error::{GovernanceError, GovernanceResult};
use crate::model::{Expert, VisibilityStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// PRIVATE -> GLOBAL_POOL, stamping `privateExpiresAt = at`
    Release { at: DateTime<Utc> },
    /// GLOBAL_POOL -> PRIVATE under `owner_id` until `expires_at`
    Claim {
        owner_id: String,
        expires_at: DateTime<Utc>,
    },
}

impl Transition {
    pub fn from_state(&self) -> VisibilityStatus {
        match self {
            Self::Release { .. } => VisibilityStatus::Private,
            Self::Claim { .. } => VisibilityStatus::GlobalPool,
        }
    }

    pub fn to_state(&self) -> VisibilityStatus {
        match self {
            Self::Release { .. } => VisibilityStatus::GlobalPool,
            Self::Claim { .. } => VisibilityStatus::Private,
        }
    }
}

/// Guards and writes for one transition, without an audit row.
///
/// Fails with Conflict when the snapshot is not in the transition's source
/// state.
pub fn plan(expert: &Expert, transition: Transition) -> GovernanceResult<WriteBatch> {
    let from = transition.from_state();
    if expert.visibility_status != from {
        return Err(GovernanceError::conflict(format!(
            "expert {} is {}, cannot move to {}",
            expert.id,
            expert.visibility_status,
            transition.to_state()
        )));
    }

    let batch = WriteBatch::new().guard(Guard::Visibility {
        expert_id: expert.id.clone(),
        expected: from,
    });

    Ok(match transition {
        Transition::Release { at } => batch.write(Write::ReleaseToPool {
            expert_id: expert.id.clone(),
            at,
        }),
        Transition::Claim {
            owner_id,
            expires_at,
        } => batch
            .guard(Guard::Owner {
                expert_id: expert.id.clone(),
                expected: expert.owner_id.clone(),
            })
            .write(Write::ClaimPrivate {
                expert_id: expert.id.clone(),
                owner_id,
                expires_at,
            }),
    })
}

#[derive(Clone)]
pub struct VisibilityStateMachine {
    store: Arc<dyn GovernanceStore>,
    audit: AuditLog,
}

impl VisibilityStateMachine {
    pub fn new(store: Arc<dyn GovernanceStore>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    /// Apply one transition together with its audit row.
    pub async fn transition(
        &self,
        expert: &Expert,
        transition: Transition,
        append: AuditAppend,
        extra_guards: Vec<Guard>,
    ) -> GovernanceResult<CommitReceipt> {
        let mut batch = plan(expert, transition)?.audit(append);
        batch.guards.extend(extra_guards);
        self.apply(batch).await
    }

    /// Commit a planned batch and mirror its audit rows.
    pub async fn apply(&self, batch: WriteBatch) -> GovernanceResult<CommitReceipt> {
        let receipt = self.store.commit(batch).await?;
        self.audit.emit(&receipt.audit);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditMetadata, MAX_AUDIT_LIMIT};
    use crate::database::InMemoryStore;
    use crate::model::ExpertProfile;
    use chrono::Duration;

    fn expert(id: &str) -> Expert {
        let now = Utc::now();
        Expert::new_private(
            id.into(),
            ExpertProfile {
                name: "Lior".into(),
                ..Default::default()
            },
            "u1".into(),
            now + Duration::days(3),
            now,
        )
    }

    fn force_expire_append(id: &str) -> AuditAppend {
        AuditAppend::new(AuditMetadata::ForceExpire {
            previous_owner_id: Some("u1".into()),
            manual_override: true,
        })
        .by("admin")
        .on(id)
    }

    async fn machine_with(expert: Expert) -> (Arc<InMemoryStore>, VisibilityStateMachine) {
        let store = Arc::new(InMemoryStore::new());
        store
            .commit(WriteBatch::new().write(Write::InsertExpert(Box::new(expert))))
            .await
            .unwrap();
        let dyn_store: Arc<dyn GovernanceStore> = store.clone();
        let audit = AuditLog::new(dyn_store.clone(), MAX_AUDIT_LIMIT);
        (store, VisibilityStateMachine::new(dyn_store, audit))
    }

    #[test]
    fn test_plan_rejects_wrong_source_state() {
        let mut pooled = expert("e1");
        pooled.visibility_status = VisibilityStatus::GlobalPool;
        let err = plan(&pooled, Transition::Release { at: Utc::now() }).unwrap_err();
        assert!(err.is_conflict());

        let private = expert("e2");
        let err = plan(
            &private,
            Transition::Claim {
                owner_id: "u2".into(),
                expires_at: Utc::now(),
            },
        )
        .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_claim_plan_guards_owner() {
        let mut pooled = expert("e1");
        pooled.visibility_status = VisibilityStatus::GlobalPool;
        let batch = plan(
            &pooled,
            Transition::Claim {
                owner_id: "u2".into(),
                expires_at: Utc::now(),
            },
        )
        .unwrap();
        assert_eq!(batch.guards.len(), 2);
        assert!(batch.audit.is_empty());
    }

    #[tokio::test]
    async fn test_release_writes_one_audit_row() {
        let (store, machine) = machine_with(expert("e1")).await;
        let snapshot = store.get_expert("e1").await.unwrap().unwrap();

        let at = Utc::now();
        let receipt = machine
            .transition(&snapshot, Transition::Release { at }, force_expire_append("e1"), vec![])
            .await
            .unwrap();
        assert_eq!(receipt.audit.len(), 1);

        let released = store.get_expert("e1").await.unwrap().unwrap();
        assert_eq!(released.visibility_status, VisibilityStatus::GlobalPool);
        assert_eq!(released.private_expires_at, Some(at));
        assert_eq!(released.owner_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_stale_snapshot_conflicts_without_audit() {
        let (store, machine) = machine_with(expert("e1")).await;
        let stale = store.get_expert("e1").await.unwrap().unwrap();

        machine
            .transition(&stale, Transition::Release { at: Utc::now() }, force_expire_append("e1"), vec![])
            .await
            .unwrap();
        let err = machine
            .transition(&stale, Transition::Release { at: Utc::now() }, force_expire_append("e1"), vec![])
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.audit_len().await, 1);
    }
}
