use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::collab::{ScrapeRequest, WorkflowDispatch};
use crate::database::{GovernanceStore, Write, WriteBatch};
use crate::error::{GovernanceError, GovernanceResult};
use crate::liquidity::analyzer::{analyze, segment_label, LiquidityReport};
use crate::model::{new_id, Caller, DemandSignal, DemandStatus, SegmentCriteria};

#[derive(Debug, Clone, Serialize)]
pub struct TriggerScrapeOutcome {
    pub signal: DemandSignal,
    pub scraping_started: bool,
    pub message: String,
}

/// Signed status update from the workflow engine.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowCallback {
    pub signal_id: String,
    pub status: DemandStatus,
}

#[derive(Clone)]
pub struct LiquidityService {
    store: Arc<dyn GovernanceStore>,
    workflow: Arc<dyn WorkflowDispatch>,
    gap_threshold: usize,
}

impl LiquidityService {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        workflow: Arc<dyn WorkflowDispatch>,
        gap_threshold: usize,
    ) -> Self {
        Self {
            store,
            workflow,
            gap_threshold,
        }
    }

    /// Read-only snapshot; tolerates slightly stale supply.
    pub async fn report(&self, caller: &Caller) -> GovernanceResult<LiquidityReport> {
        caller.require_admin()?;
        let signals = self.store.active_demand_signals().await?;
        let supply = self.store.pool_supply().await?;
        Ok(analyze(&signals, &supply, self.gap_threshold))
    }

    /// Register demand for a segment and ask the workflow engine to source it.
    pub async fn trigger_scrape(
        &self,
        caller: &Caller,
        criteria: SegmentCriteria,
    ) -> GovernanceResult<TriggerScrapeOutcome> {
        caller.require_admin()?;
        if criteria.is_empty() {
            return Err(GovernanceError::validation(
                "at least one of industry, sub_industry or region is required",
            ));
        }

        let mut signal = DemandSignal {
            id: new_id(),
            title: format!("Replenish {}", segment_label(&criteria)),
            industry: criteria.industry.trim().to_string(),
            sub_industry: criteria.sub_industry.trim().to_string(),
            region: criteria.region.trim().to_string(),
            status: DemandStatus::Pending,
            created_at: Utc::now(),
        };
        self.store
            .commit(WriteBatch::new().write(Write::InsertDemandSignal(signal.clone())))
            .await?;

        let request = ScrapeRequest {
            signal_id: signal.id.clone(),
            industry: signal.industry.clone(),
            sub_industry: signal.sub_industry.clone(),
            region: signal.region.clone(),
            requested_by: caller.user_id.clone(),
        };

        // No lock is held across the outbound call
        match self.workflow.start_scrape(&request).await {
            Ok(()) => {
                self.store
                    .commit(WriteBatch::new().write(Write::SetDemandStatus {
                        signal_id: signal.id.clone(),
                        status: DemandStatus::Running,
                    }))
                    .await?;
                signal.status = DemandStatus::Running;
                info!(signal_id = %signal.id, label = %signal.title, "Replenishment scrape started");
                Ok(TriggerScrapeOutcome {
                    signal,
                    scraping_started: true,
                    message: "scrape started".to_string(),
                })
            }
            Err(e) => {
                warn!(signal_id = %signal.id, error = %e, "Replenishment scrape could not start");
                Ok(TriggerScrapeOutcome {
                    signal,
                    scraping_started: false,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Move a signal forward after a verified workflow callback.
    pub async fn apply_callback(&self, callback: WorkflowCallback) -> GovernanceResult<DemandSignal> {
        let mut signal = self
            .store
            .get_demand_signal(&callback.signal_id)
            .await?
            .ok_or_else(|| {
                GovernanceError::not_found(format!("demand signal {}", callback.signal_id))
            })?;

        if !signal.status.is_active() {
            return Err(GovernanceError::conflict(format!(
                "demand signal {} is already {}",
                signal.id,
                signal.status.as_str()
            )));
        }
        if callback.status == DemandStatus::Pending {
            return Err(GovernanceError::validation(
                "callback status must be RUNNING, COMPLETED or FAILED",
            ));
        }

        self.store
            .commit(WriteBatch::new().write(Write::SetDemandStatus {
                signal_id: signal.id.clone(),
                status: callback.status,
            }))
            .await?;
        signal.status = callback.status;

        info!(signal_id = %signal.id, status = signal.status.as_str(), "Workflow callback applied");
        Ok(signal)
    }
}
