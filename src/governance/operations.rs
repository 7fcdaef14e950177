//! Governance Operations
//!
//! Composed admin actions and expert record management. Each public
//! operation commits at most one batch.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::audit::{AuditAppend, AuditMetadata};
use crate::database::{GovernanceStore, Write, WriteBatch};
use crate::error::{GovernanceError, GovernanceResult};
use crate::governance::settings::SettingsService;
use crate::governance::visibility::{self, Transition, VisibilityStateMachine};
use crate::model::{new_id, Caller, Expert, ExpertProfile, Role, User, VisibilityStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct BulkReclaimRequest {
    pub expert_ids: Vec<String>,
    pub new_owner_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReclaimOutcome {
    pub reclaimed: usize,
    pub expert_ids: Vec<String>,
    /// Requested ids that were not in the pool or do not exist
    pub skipped: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct GovernanceOperations {
    store: Arc<dyn GovernanceStore>,
    machine: VisibilityStateMachine,
    settings: SettingsService,
    bulk_reclaim_max: usize,
}

impl GovernanceOperations {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        machine: VisibilityStateMachine,
        settings: SettingsService,
        bulk_reclaim_max: usize,
    ) -> Self {
        Self {
            store,
            machine,
            settings,
            bulk_reclaim_max,
        }
    }

    async fn load_expert(&self, expert_id: &str) -> GovernanceResult<Expert> {
        self.store
            .get_expert(expert_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("expert {}", expert_id)))
    }

    async fn load_user(&self, user_id: &str) -> GovernanceResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("user {}", user_id)))
    }

    /// Create an expert held privately by the caller.
    pub async fn register_expert(
        &self,
        caller: &Caller,
        profile: ExpertProfile,
    ) -> GovernanceResult<Expert> {
        if profile.name.trim().is_empty() {
            return Err(GovernanceError::validation("name is required"));
        }
        if profile.predicted_rate.is_some_and(|rate| !rate.is_finite() || rate < 0.0) {
            return Err(GovernanceError::validation(
                "predicted_rate must be a non-negative amount",
            ));
        }

        let now = Utc::now();
        let expires_at = now + Duration::days(i64::from(self.settings.expiry_days().await?));
        let expert = Expert::new_private(new_id(), profile, caller.user_id.clone(), expires_at, now);
        let expert_id = expert.id.clone();

        let batch = WriteBatch::new()
            .write(Write::InsertExpert(Box::new(expert)))
            .write(Write::RecomputeReputation {
                expert_id: expert_id.clone(),
            })
            .audit(
                AuditAppend::new(AuditMetadata::profile_edit("created", json!(true)))
                    .by(caller.user_id.clone())
                    .on(expert_id.clone()),
            );
        self.machine.apply(batch).await?;

        self.load_expert(&expert_id).await
    }

    /// Read an expert, masking contacts the caller may not see.
    pub async fn get_expert(&self, caller: &Caller, expert_id: &str) -> GovernanceResult<Expert> {
        let expert = self.load_expert(expert_id).await?;
        if expert.contact_cloaked && !caller.is_admin() && !expert.is_owned_by(&caller.user_id) {
            return Ok(expert.cloaked());
        }
        Ok(expert)
    }

    pub async fn set_contact_cloak(
        &self,
        caller: &Caller,
        expert_id: &str,
        cloaked: bool,
    ) -> GovernanceResult<Expert> {
        let expert = self.load_expert(expert_id).await?;
        if !caller.is_admin() && !expert.is_owned_by(&caller.user_id) {
            return Err(GovernanceError::forbidden(
                "only the owner or an admin may change contact privacy",
            ));
        }

        let batch = WriteBatch::new()
            .write(Write::SetContactCloak {
                expert_id: expert.id.clone(),
                cloaked,
            })
            .audit(
                AuditAppend::new(AuditMetadata::profile_edit("contactCloaked", json!(cloaked)))
                    .by(caller.user_id.clone())
                    .on(expert.id.clone()),
            );
        self.machine.apply(batch).await?;

        self.load_expert(expert_id).await
    }

    pub async fn set_user_role(
        &self,
        caller: &Caller,
        user_id: &str,
        role: Role,
    ) -> GovernanceResult<User> {
        caller.require_admin()?;
        self.load_user(user_id).await?;

        let batch = WriteBatch::new()
            .write(Write::SetUserRole {
                user_id: user_id.to_string(),
                role,
            })
            .audit(
                AuditAppend::new(AuditMetadata::role_change(role))
                    .by(caller.user_id.clone())
                    .on(user_id),
            );
        self.machine.apply(batch).await?;

        self.load_user(user_id).await
    }

    /// Claim pooled experts for one owner in a single commit.
    ///
    /// Experts that are not in the pool are skipped; when none qualify
    /// nothing is written.
    pub async fn bulk_reclaim(
        &self,
        caller: &Caller,
        request: BulkReclaimRequest,
    ) -> GovernanceResult<BulkReclaimOutcome> {
        caller.require_admin()?;

        let mut seen = HashSet::new();
        let requested: Vec<String> = request
            .expert_ids
            .into_iter()
            .filter(|id| !id.trim().is_empty() && seen.insert(id.clone()))
            .collect();
        if requested.is_empty() || requested.len() > self.bulk_reclaim_max {
            return Err(GovernanceError::validation(format!(
                "expert_ids must contain between 1 and {} ids",
                self.bulk_reclaim_max
            )));
        }
        self.load_user(&request.new_owner_id).await?;

        let experts = self.store.get_experts(&requested).await?;
        let mut pooled: Vec<Expert> = experts
            .into_iter()
            .filter(|e| e.visibility_status == VisibilityStatus::GlobalPool)
            .collect();
        // Guards are planned in id order, matching the store's lock order
        pooled.sort_by(|a, b| a.id.cmp(&b.id));

        // Keep request order for the reclaimed list
        let pooled_ids: HashSet<&str> = pooled.iter().map(|e| e.id.as_str()).collect();
        let reclaimed_ids: Vec<String> = requested
            .iter()
            .filter(|id| pooled_ids.contains(id.as_str()))
            .cloned()
            .collect();
        let skipped: Vec<String> = requested
            .iter()
            .filter(|id| !pooled_ids.contains(id.as_str()))
            .cloned()
            .collect();

        if reclaimed_ids.is_empty() {
            info!(requested = requested.len(), "Bulk reclaim found no pooled experts");
            return Ok(BulkReclaimOutcome {
                reclaimed: 0,
                expert_ids: Vec::new(),
                skipped,
                expires_at: None,
            });
        }

        let expires_at = Utc::now() + Duration::days(i64::from(self.settings.expiry_days().await?));
        let mut batch = WriteBatch::new();
        for expert in &pooled {
            batch.extend(visibility::plan(
                expert,
                Transition::Claim {
                    owner_id: request.new_owner_id.clone(),
                    expires_at,
                },
            )?);
        }
        let batch = batch.audit(
            AuditAppend::new(AuditMetadata::BulkReclaim {
                expert_ids: reclaimed_ids.clone(),
                new_owner_id: request.new_owner_id.clone(),
                count: reclaimed_ids.len(),
            })
            .by(caller.user_id.clone())
            .on(reclaimed_ids[0].clone()),
        );
        self.machine.apply(batch).await?;

        info!(
            count = reclaimed_ids.len(),
            new_owner_id = %request.new_owner_id,
            actor_id = %caller.user_id,
            "Bulk reclaimed pooled experts"
        );
        Ok(BulkReclaimOutcome {
            reclaimed: reclaimed_ids.len(),
            expert_ids: reclaimed_ids,
            skipped,
            expires_at: Some(expires_at),
        })
    }
}
