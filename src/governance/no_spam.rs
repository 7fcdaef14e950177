//! No-Spam Auditor
//!
//! Demotes a pooled expert back to PRIVATE when it has been contacted more
//! than the allowed number of times in the trailing window without a single
//! booking. The request path (each new contact attempt) and the batch sweep
//! both decide through [`should_demote`].

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::{AuditAppend, AuditMetadata};
use crate::database::{GovernanceStore, Write, WriteBatch};
use crate::error::{GovernanceError, GovernanceResult};
use crate::governance::settings::SettingsService;
use crate::governance::visibility::{Transition, VisibilityStateMachine};
use crate::model::{new_id, Caller, ContactAttempt, Expert, VisibilityStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoSpamPolicy {
    pub window_days: u32,
    pub max_attempts_without_booking: u64,
}

impl Default for NoSpamPolicy {
    fn default() -> Self {
        Self {
            window_days: 7,
            max_attempts_without_booking: 3,
        }
    }
}

/// The demotion rule, pure in its inputs.
pub fn should_demote(
    policy: &NoSpamPolicy,
    attempts: u64,
    bookings: u64,
    status: VisibilityStatus,
) -> bool {
    attempts > policy.max_attempts_without_booking
        && bookings == 0
        && status != VisibilityStatus::Private
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowCounts {
    pub attempts: u64,
    pub bookings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Demotion {
    Unchanged,
    Demoted { owner_id: String },
    /// Rule fired but the expert has no owner to hold it privately
    SkippedNoOwner,
    Conflict,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactAttemptOutcome {
    pub weekly_contact_attempts: u64,
    pub weekly_bookings: u64,
    pub visibility_lowered: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoSpamSweepReport {
    pub scanned_experts: usize,
    pub lowered_visibility: usize,
    pub conflicts: usize,
}

#[derive(Clone)]
pub struct NoSpamAuditor {
    store: Arc<dyn GovernanceStore>,
    machine: VisibilityStateMachine,
    settings: SettingsService,
    policy: NoSpamPolicy,
}

impl NoSpamAuditor {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        machine: VisibilityStateMachine,
        settings: SettingsService,
        policy: NoSpamPolicy,
    ) -> Self {
        Self {
            store,
            machine,
            settings,
            policy,
        }
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.policy.window_days))
    }

    pub async fn window_counts(
        &self,
        expert_id: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<WindowCounts> {
        let since = self.window_start(now);
        Ok(WindowCounts {
            attempts: self.store.count_contact_attempts(expert_id, since).await?,
            bookings: self.store.count_engagements(expert_id, since).await?,
        })
    }

    async fn demote(
        &self,
        expert: &Expert,
        counts: WindowCounts,
        now: DateTime<Utc>,
    ) -> GovernanceResult<Demotion> {
        let Some(owner_id) = expert.owner_id.clone() else {
            warn!(expert_id = %expert.id, "No-spam rule fired for an ownerless expert, skipping");
            return Ok(Demotion::SkippedNoOwner);
        };

        let expires_at = now + Duration::days(i64::from(self.settings.expiry_days().await?));
        let append = AuditAppend::new(AuditMetadata::VisibilityDemotion {
            attempts: counts.attempts,
            bookings: counts.bookings,
            window_days: self.policy.window_days,
        })
        .on(expert.id.clone());

        match self
            .machine
            .transition(
                expert,
                Transition::Claim {
                    owner_id: owner_id.clone(),
                    expires_at,
                },
                append,
                Vec::new(),
            )
            .await
        {
            Ok(_) => {
                info!(
                    expert_id = %expert.id,
                    attempts = counts.attempts,
                    "Demoted over-contacted expert to PRIVATE"
                );
                Ok(Demotion::Demoted { owner_id })
            }
            Err(e) if e.is_conflict() => {
                debug!(expert_id = %expert.id, error = %e, "Demotion lost a race");
                Ok(Demotion::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply the rule to one expert as of `now`.
    pub async fn evaluate(
        &self,
        expert_id: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<(WindowCounts, Demotion)> {
        let expert = self
            .store
            .get_expert(expert_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("expert {}", expert_id)))?;
        let counts = self.window_counts(expert_id, now).await?;

        if !should_demote(&self.policy, counts.attempts, counts.bookings, expert.visibility_status) {
            return Ok((counts, Demotion::Unchanged));
        }
        let demotion = self.demote(&expert, counts, now).await?;
        Ok((counts, demotion))
    }

    /// Record an outreach attempt, then re-evaluate the rule.
    pub async fn record_contact_attempt(
        &self,
        caller: &Caller,
        expert_id: &str,
    ) -> GovernanceResult<ContactAttemptOutcome> {
        let now = Utc::now();
        let attempt = ContactAttempt {
            id: new_id(),
            expert_id: expert_id.to_string(),
            created_at: now,
        };
        self.store
            .commit(WriteBatch::new().write(Write::InsertContactAttempt(attempt)))
            .await?;
        debug!(expert_id = %expert_id, caller = %caller.user_id, "Recorded contact attempt");

        let (counts, demotion) = self.evaluate(expert_id, now).await?;
        Ok(ContactAttemptOutcome {
            weekly_contact_attempts: counts.attempts,
            weekly_bookings: counts.bookings,
            visibility_lowered: matches!(demotion, Demotion::Demoted { .. }),
        })
    }

    /// Re-evaluate every expert contacted within the window.
    pub async fn sweep(&self, now: DateTime<Utc>) -> GovernanceResult<NoSpamSweepReport> {
        let expert_ids = self
            .store
            .experts_contacted_since(self.window_start(now))
            .await?;
        let mut report = NoSpamSweepReport {
            scanned_experts: expert_ids.len(),
            ..Default::default()
        };

        for expert_id in &expert_ids {
            match self.evaluate(expert_id, now).await {
                Ok((_, Demotion::Demoted { .. })) => report.lowered_visibility += 1,
                Ok((_, Demotion::Conflict)) => report.conflicts += 1,
                Ok(_) => {}
                Err(GovernanceError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!(
            scanned = report.scanned_experts,
            lowered = report.lowered_visibility,
            conflicts = report.conflicts,
            "No-spam sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_matrix() {
        let policy = NoSpamPolicy::default();
        assert!(should_demote(&policy, 4, 0, VisibilityStatus::GlobalPool));
        assert!(!should_demote(&policy, 3, 0, VisibilityStatus::GlobalPool));
        assert!(!should_demote(&policy, 2, 0, VisibilityStatus::GlobalPool));
        assert!(!should_demote(&policy, 4, 1, VisibilityStatus::GlobalPool));
        assert!(!should_demote(&policy, 40, 0, VisibilityStatus::Private));
    }

    #[test]
    fn test_policy_threshold_is_configurable() {
        let policy = NoSpamPolicy {
            window_days: 7,
            max_attempts_without_booking: 1,
        };
        assert!(should_demote(&policy, 2, 0, VisibilityStatus::GlobalPool));
    }
}
