//! Scheduled sweeps and signed workflow callbacks.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::AppState;
use crate::collab::signing;
use crate::error::{GovernanceError, GovernanceResult};
use crate::governance::{ExpirySweepReport, NoSpamSweepReport};
use crate::liquidity::WorkflowCallback;
use crate::model::DemandSignal;

#[derive(Debug, Default, Deserialize)]
pub struct SweepParams {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub signal: DemandSignal,
}

/// POST /cron/expire-ownership
pub async fn expire_ownership(
    State(state): State<AppState>,
    Query(params): Query<SweepParams>,
) -> GovernanceResult<Json<ExpirySweepReport>> {
    let report = state
        .engine
        .decay
        .sweep_expired(Utc::now(), params.dry_run)
        .await?;
    info!(
        scanned = report.scanned,
        released = report.released.len(),
        conflicts = report.conflicts.len(),
        dry_run = report.dry_run,
        "Expiry sweep finished"
    );
    Ok(Json(report))
}

/// POST /cron/no-spam-auditor
pub async fn no_spam_audit(
    State(state): State<AppState>,
) -> GovernanceResult<Json<NoSpamSweepReport>> {
    let report = state.engine.no_spam.sweep(Utc::now()).await?;
    info!(
        scanned = report.scanned_experts,
        lowered = report.lowered_visibility,
        conflicts = report.conflicts,
        "No-spam sweep finished"
    );
    Ok(Json(report))
}

/// POST /webhooks/workflow-callback
///
/// The signature covers the raw body, so it is checked before the JSON is
/// parsed or any state is touched.
pub async fn workflow_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> GovernanceResult<Json<CallbackResponse>> {
    let Some(signature) = signing::extract_signature(&headers) else {
        warn!("Workflow callback without signature");
        return Err(GovernanceError::Unauthorized);
    };
    if !signing::verify(state.webhook_secret.as_bytes(), &body, &signature) {
        warn!("Workflow callback signature mismatch");
        return Err(GovernanceError::Unauthorized);
    }

    let callback: WorkflowCallback = serde_json::from_slice(&body)
        .map_err(|e| GovernanceError::validation(format!("invalid callback body: {}", e)))?;
    let signal = state.engine.liquidity.apply_callback(callback).await?;
    Ok(Json(CallbackResponse { signal }))
}
