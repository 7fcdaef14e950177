//! Decay / Expiry Scheduler
//!
//! Two read paths and two write paths over the same time predicate:
//!
//! - `forecast` buckets PRIVATE experts by time to expiry, never mutating
//! - `force_expire` releases one expert immediately (admin)
//! - `sweep_expired` releases every expired expert without a verified
//!   contact, one guarded commit per expert
//!
//! Nothing here owns a timer; sweeps are triggered from outside and are
//! safe to overlap with each other and with request-path mutations.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditAppend, AuditEntry, AuditLog, AuditMetadata};
use crate::database::{ExpiringExpert, GovernanceStore, Guard};
use crate::error::{GovernanceError, GovernanceResult};
use crate::governance::settings::SettingsService;
use crate::governance::visibility::{Transition, VisibilityStateMachine};
use crate::model::{Caller, Expert};

pub const FORECAST_LIST_LIMIT: usize = 100;
pub const RECENT_FORCE_EXPIRES: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ExpiryBuckets {
    /// Includes experts already past expiry
    pub within_24h: u64,
    pub within_7d: u64,
    pub within_15d: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecayForecast {
    pub buckets: ExpiryBuckets,
    pub expiring: Vec<ExpiringExpert>,
    pub recent_force_expires: Vec<AuditEntry>,
    pub expiry_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForceExpireOutcome {
    pub expert_id: String,
    pub previous_owner_id: Option<String>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpirySweepReport {
    pub scanned: usize,
    pub released: Vec<String>,
    /// Experts changed by someone else between read and release
    pub conflicts: Vec<String>,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct DecayScheduler {
    store: Arc<dyn GovernanceStore>,
    audit: AuditLog,
    machine: VisibilityStateMachine,
    settings: SettingsService,
    batch_limit: usize,
}

impl DecayScheduler {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        audit: AuditLog,
        machine: VisibilityStateMachine,
        settings: SettingsService,
        batch_limit: usize,
    ) -> Self {
        Self {
            store,
            audit,
            machine,
            settings,
            batch_limit,
        }
    }

    /// Bucket counts of PRIVATE experts by time to expiry.
    pub async fn buckets(&self, now: DateTime<Utc>) -> GovernanceResult<ExpiryBuckets> {
        let day = now + Duration::hours(24);
        let week = now + Duration::days(7);
        let fortnight = now + Duration::days(15);

        Ok(ExpiryBuckets {
            within_24h: self.store.count_private_expiring(None, day).await?,
            within_7d: self.store.count_private_expiring(Some(day), week).await?,
            within_15d: self.store.count_private_expiring(Some(week), fortnight).await?,
        })
    }

    pub async fn forecast(&self, caller: &Caller, now: DateTime<Utc>) -> GovernanceResult<DecayForecast> {
        caller.require_admin()?;
        Ok(DecayForecast {
            buckets: self.buckets(now).await?,
            expiring: self.store.list_private_by_expiry(FORECAST_LIST_LIMIT).await?,
            recent_force_expires: self
                .audit
                .recent(AuditAction::ForceExpire, RECENT_FORCE_EXPIRES)
                .await?,
            expiry_days: self.settings.expiry_days().await?,
        })
    }

    /// Release an expert to the pool now. A second call conflicts.
    pub async fn force_expire(
        &self,
        caller: &Caller,
        expert_id: &str,
    ) -> GovernanceResult<ForceExpireOutcome> {
        caller.require_admin()?;
        let expert = self
            .store
            .get_expert(expert_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("expert {}", expert_id)))?;

        let now = Utc::now();
        let append = AuditAppend::new(AuditMetadata::ForceExpire {
            previous_owner_id: expert.owner_id.clone(),
            manual_override: true,
        })
        .by(caller.user_id.clone())
        .on(expert.id.clone());
        self.machine
            .transition(&expert, Transition::Release { at: now }, append, Vec::new())
            .await?;

        Ok(ForceExpireOutcome {
            expert_id: expert.id,
            previous_owner_id: expert.owner_id,
            expired_at: now,
        })
    }

    async fn release_expired(&self, expert: &Expert, now: DateTime<Utc>) -> GovernanceResult<()> {
        let append = AuditAppend::new(AuditMetadata::AutoExpiry {
            previous_owner_id: expert.owner_id.clone(),
            expert_name: expert.profile.name.clone(),
        })
        .on(expert.id.clone());
        let still_expired = Guard::ExpiredBy {
            expert_id: expert.id.clone(),
            at: now,
        };
        self.machine
            .transition(expert, Transition::Release { at: now }, append, vec![still_expired])
            .await?;
        Ok(())
    }

    /// Release every expired PRIVATE expert that has no verified contact.
    pub async fn sweep_expired(
        &self,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> GovernanceResult<ExpirySweepReport> {
        let candidates = self.store.find_expired_private(now, self.batch_limit).await?;
        let mut report = ExpirySweepReport {
            scanned: candidates.len(),
            dry_run,
            ..Default::default()
        };

        for expert in &candidates {
            if dry_run {
                report.released.push(expert.id.clone());
                continue;
            }
            match self.release_expired(expert, now).await {
                Ok(()) => report.released.push(expert.id.clone()),
                Err(e) if e.is_conflict() => {
                    debug!(expert_id = %expert.id, error = %e, "Expiry release lost a race");
                    report.conflicts.push(expert.id.clone());
                }
                Err(e) => {
                    warn!(expert_id = %expert.id, error = %e, "Expiry release failed");
                    return Err(e);
                }
            }
        }

        info!(
            scanned = report.scanned,
            released = report.released.len(),
            conflicts = report.conflicts.len(),
            dry_run = dry_run,
            "Expiry sweep complete"
        );
        Ok(report)
    }
}
