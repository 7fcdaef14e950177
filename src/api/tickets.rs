//! Ownership transfer tickets.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::api::AppState;
use crate::error::GovernanceResult;
use crate::governance::OpenTicketRequest;
use crate::model::{Caller, Ticket};

/// POST /tickets
pub async fn open_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<OpenTicketRequest>,
) -> GovernanceResult<(StatusCode, Json<Ticket>)> {
    let ticket = state.engine.tickets.open(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// POST /tickets/{id}/approve
pub async fn approve_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Path(ticket_id): Path<String>,
) -> GovernanceResult<Json<Ticket>> {
    Ok(Json(state.engine.tickets.approve(&caller, &ticket_id).await?))
}

/// POST /tickets/{id}/reject
pub async fn reject_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Path(ticket_id): Path<String>,
) -> GovernanceResult<Json<Ticket>> {
    Ok(Json(state.engine.tickets.reject(&caller, &ticket_id).await?))
}
