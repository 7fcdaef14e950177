//! Administrative endpoints. Every handler here requires an admin caller;
//! the check lives in the service so other entry points get it too.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::AppState;
use crate::audit::{AuditEntry, AuditQuery};
use crate::error::GovernanceResult;
use crate::governance::{
    BulkReclaimOutcome, BulkReclaimRequest, DecayForecast, ForceExpireOutcome, ReassignOutcome,
};
use crate::liquidity::{LiquidityReport, TriggerScrapeOutcome};
use crate::model::{Caller, Role, SegmentCriteria, SystemSettings, Ticket, User};

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub new_owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DecayConfigRequest {
    /// Signed so out-of-range input is rejected with a clear message
    pub expiry_days: i64,
}

#[derive(Debug, Deserialize)]
pub struct MlSensitivityRequest {
    pub ml_sensitivity: f64,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// PATCH /admin/experts/{id}/force-expire
pub async fn force_expire(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
) -> GovernanceResult<Json<ForceExpireOutcome>> {
    Ok(Json(state.engine.decay.force_expire(&caller, &expert_id).await?))
}

/// PATCH /admin/experts/{id}/reassign
pub async fn reassign(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
    Json(request): Json<ReassignRequest>,
) -> GovernanceResult<Json<ReassignOutcome>> {
    let outcome = state
        .engine
        .tickets
        .reassign_owner(&caller, &expert_id, &request.new_owner_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /admin/bulk-reclaim
pub async fn bulk_reclaim(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<BulkReclaimRequest>,
) -> GovernanceResult<Json<BulkReclaimOutcome>> {
    Ok(Json(state.engine.operations.bulk_reclaim(&caller, request).await?))
}

/// GET /admin/decay
pub async fn decay_forecast(
    State(state): State<AppState>,
    caller: Caller,
) -> GovernanceResult<Json<DecayForecast>> {
    Ok(Json(state.engine.decay.forecast(&caller, Utc::now()).await?))
}

/// PATCH /admin/decay/config
pub async fn update_decay_config(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<DecayConfigRequest>,
) -> GovernanceResult<Json<SystemSettings>> {
    let settings = state
        .engine
        .settings
        .update_expiry_days(&caller, request.expiry_days)
        .await?;
    Ok(Json(settings))
}

/// GET /admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
    caller: Caller,
) -> GovernanceResult<Json<SystemSettings>> {
    caller.require_admin()?;
    Ok(Json(state.engine.settings.current().await?))
}

/// PATCH /admin/settings/ml-sensitivity
pub async fn update_ml_sensitivity(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<MlSensitivityRequest>,
) -> GovernanceResult<Json<SystemSettings>> {
    let settings = state
        .engine
        .settings
        .update_ml_sensitivity(&caller, request.ml_sensitivity)
        .await?;
    Ok(Json(settings))
}

/// GET /admin/liquidity
pub async fn liquidity_report(
    State(state): State<AppState>,
    caller: Caller,
) -> GovernanceResult<Json<LiquidityReport>> {
    Ok(Json(state.engine.liquidity.report(&caller).await?))
}

/// POST /admin/liquidity/trigger-scrape
pub async fn trigger_scrape(
    State(state): State<AppState>,
    caller: Caller,
    Json(criteria): Json<SegmentCriteria>,
) -> GovernanceResult<Json<TriggerScrapeOutcome>> {
    Ok(Json(state.engine.liquidity.trigger_scrape(&caller, criteria).await?))
}

/// GET /admin/audit
pub async fn audit_log(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AuditQuery>,
) -> GovernanceResult<Json<Vec<AuditEntry>>> {
    caller.require_admin()?;
    Ok(Json(state.engine.audit.query(&query).await?))
}

/// PATCH /admin/users/{id}/role
pub async fn set_user_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> GovernanceResult<Json<User>> {
    let user = state
        .engine
        .operations
        .set_user_role(&caller, &user_id, request.role)
        .await?;
    Ok(Json(user))
}

/// GET /admin/tickets
pub async fn open_tickets(
    State(state): State<AppState>,
    caller: Caller,
) -> GovernanceResult<Json<Vec<Ticket>>> {
    Ok(Json(state.engine.tickets.list_open(&caller).await?))
}
