//! Expert endpoints: registration, reads, outreach, knowledge loop and
//! rate estimates.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::collab::{RankedExpert, RateEstimate};
use crate::error::GovernanceResult;
use crate::governance::ContactAttemptOutcome;
use crate::model::{Caller, Expert, ExpertProfile, NewEngagement};
use crate::reputation::{AuthorityUpdate, EngagementOutcome, ReputationBreakdown};

#[derive(Debug, Deserialize)]
pub struct PrivacyRequest {
    pub contact_cloaked: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthorityResponse {
    pub expert_id: String,
    pub professional_authority_index: f64,
}

#[derive(Debug, Serialize)]
pub struct RankingResponse {
    pub project_id: String,
    pub experts: Vec<RankedExpert>,
}

/// POST /experts
pub async fn register_expert(
    State(state): State<AppState>,
    caller: Caller,
    Json(profile): Json<ExpertProfile>,
) -> GovernanceResult<(StatusCode, Json<Expert>)> {
    let expert = state.engine.operations.register_expert(&caller, profile).await?;
    Ok((StatusCode::CREATED, Json(expert)))
}

/// GET /experts/{id}
pub async fn get_expert(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
) -> GovernanceResult<Json<Expert>> {
    Ok(Json(state.engine.operations.get_expert(&caller, &expert_id).await?))
}

/// POST /experts/{id}/contact-attempt
pub async fn record_contact_attempt(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
) -> GovernanceResult<Json<ContactAttemptOutcome>> {
    let outcome = state
        .engine
        .no_spam
        .record_contact_attempt(&caller, &expert_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /experts/{id}/repute
pub async fn recompute_reputation(
    State(state): State<AppState>,
    _caller: Caller,
    Path(expert_id): Path<String>,
) -> GovernanceResult<Json<ReputationBreakdown>> {
    Ok(Json(state.engine.reputation.recompute(&expert_id).await?))
}

/// PATCH /experts/{id}/privacy
pub async fn set_privacy(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
    Json(request): Json<PrivacyRequest>,
) -> GovernanceResult<Json<Expert>> {
    let expert = state
        .engine
        .operations
        .set_contact_cloak(&caller, &expert_id, request.contact_cloaked)
        .await?;
    Ok(Json(expert))
}

/// POST /experts/{id}/engagements
pub async fn log_engagement(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
    Json(engagement): Json<NewEngagement>,
) -> GovernanceResult<(StatusCode, Json<EngagementOutcome>)> {
    let outcome = state
        .engine
        .reputation
        .log_engagement(&caller, &expert_id, engagement)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// PUT /experts/{id}/authority
pub async fn set_authority(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
    Json(update): Json<AuthorityUpdate>,
) -> GovernanceResult<Json<AuthorityResponse>> {
    let index = state
        .engine
        .reputation
        .set_authority(&caller, &expert_id, update)
        .await?;
    Ok(Json(AuthorityResponse {
        expert_id,
        professional_authority_index: index,
    }))
}

/// POST /experts/{id}/rate-estimate
pub async fn estimate_rate(
    State(state): State<AppState>,
    caller: Caller,
    Path(expert_id): Path<String>,
) -> GovernanceResult<Json<RateEstimate>> {
    Ok(Json(state.engine.rates.estimate(&caller, &expert_id).await?))
}

/// GET /projects/{id}/ranking
pub async fn project_ranking(
    State(state): State<AppState>,
    _caller: Caller,
    Path(project_id): Path<String>,
) -> GovernanceResult<Json<RankingResponse>> {
    let experts = state.engine.rates.rank(&project_id).await?;
    Ok(Json(RankingResponse {
        project_id,
        experts,
    }))
}
