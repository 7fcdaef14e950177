//! Reputation Manager - knowledge loop orchestrator
//!
//! Logs engagements, recomputes reputation on request and owns the
//! write-once authority index. Scores are persisted through the store; the
//! breakdown is always derived from the stored expert and its tickets.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audit::{AuditAppend, AuditLog, AuditMetadata};
use crate::database::{GovernanceStore, Guard, Write, WriteBatch};
use crate::error::{GovernanceError, GovernanceResult};
use crate::model::{new_id, Caller, Engagement, EngagementAggregates, Expert, NewEngagement};
use crate::reputation::{authority_index, score_expert, AuthorityUpdate, ReputationBreakdown};

#[derive(Debug, Clone, Serialize)]
pub struct EngagementOutcome {
    pub engagement: Engagement,
    pub aggregates: EngagementAggregates,
    pub reputation_score: f64,
}

pub struct ReputationManager {
    store: Arc<dyn GovernanceStore>,
    audit: AuditLog,
}

impl ReputationManager {
    pub fn new(store: Arc<dyn GovernanceStore>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    async fn load_expert(&self, expert_id: &str) -> GovernanceResult<Expert> {
        self.store
            .get_expert(expert_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("expert {}", expert_id)))
    }

    /// Breakdown from the current expert and ticket state.
    pub async fn breakdown(&self, expert_id: &str) -> GovernanceResult<ReputationBreakdown> {
        let expert = self.load_expert(expert_id).await?;
        let tickets = self.store.tickets_for_expert(expert_id).await?;
        Ok(score_expert(&expert, tickets.iter().map(|t| t.status)))
    }

    /// Recompute and persist the reputation score.
    pub async fn recompute(&self, expert_id: &str) -> GovernanceResult<ReputationBreakdown> {
        self.store
            .commit(WriteBatch::new().write(Write::RecomputeReputation {
                expert_id: expert_id.to_string(),
            }))
            .await?;

        let breakdown = self.breakdown(expert_id).await?;
        debug!(expert_id = %expert_id, score = breakdown.score, "Recomputed reputation");
        Ok(breakdown)
    }

    /// Knowledge loop: store the engagement, then refresh aggregates and
    /// reputation in the same commit.
    pub async fn log_engagement(
        &self,
        caller: &Caller,
        expert_id: &str,
        input: NewEngagement,
    ) -> GovernanceResult<EngagementOutcome> {
        input.validate()?;
        self.load_expert(expert_id).await?;

        let engagement = input.into_engagement(new_id(), expert_id.to_string(), Utc::now());
        let batch = WriteBatch::new()
            .write(Write::InsertEngagement(engagement.clone()))
            .write(Write::RecomputeEngagementAggregates {
                expert_id: expert_id.to_string(),
            })
            .write(Write::RecomputeReputation {
                expert_id: expert_id.to_string(),
            });
        self.store.commit(batch).await?;

        let expert = self.load_expert(expert_id).await?;
        info!(
            expert_id = %expert_id,
            logged_by = %caller.user_id,
            total_engagements = expert.aggregates.total_engagements,
            reputation = expert.reputation_score,
            "Logged engagement"
        );

        Ok(EngagementOutcome {
            engagement,
            aggregates: expert.aggregates,
            reputation_score: expert.reputation_score,
        })
    }

    /// Write the authority index; rejected once set unless overriding.
    pub async fn set_authority(
        &self,
        caller: &Caller,
        expert_id: &str,
        update: AuthorityUpdate,
    ) -> GovernanceResult<f64> {
        caller.require_admin()?;
        let expert = self.load_expert(expert_id).await?;
        if expert.professional_authority_index.is_some() && !update.override_existing {
            return Err(GovernanceError::conflict(format!(
                "authority index of expert {} is already set",
                expert_id
            )));
        }

        let index = authority_index(update.citation_count, update.patent_count);
        let mut batch = WriteBatch::new();
        if !update.override_existing {
            batch.push_guard(Guard::AuthorityUnset {
                expert_id: expert_id.to_string(),
            });
        }
        let batch = batch
            .write(Write::SetAuthority {
                expert_id: expert_id.to_string(),
                citation_count: update.citation_count,
                patent_count: update.patent_count,
                index,
            })
            .audit(
                AuditAppend::new(AuditMetadata::profile_edit(
                    "professionalAuthorityIndex",
                    serde_json::json!(index),
                ))
                .by(caller.user_id.clone())
                .on(expert_id),
            );

        let receipt = self.store.commit(batch).await?;
        self.audit.emit(&receipt.audit);
        Ok(index)
    }
}
