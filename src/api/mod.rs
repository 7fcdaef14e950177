//! HTTP API for the governance engine
//!
//! Provides REST endpoints for:
//! - Expert registration, reads and the knowledge loop
//! - Ownership tickets
//! - Admin governance (decay, reassign, bulk reclaim, settings, audit)
//! - Liquidity insights and replenishment
//! - Scheduled sweeps and signed workflow callbacks

pub mod admin;
pub mod error;
pub mod experts;
pub mod identity;
pub mod jobs;
pub mod middleware;
pub mod tickets;

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GovernanceConfig;
use crate::engine::GovernanceEngine;

pub use error::ErrorBody;
pub use identity::{IdentityResolver, StoreIdentityResolver, USER_ID_HEADER};
pub use middleware::{
    InMemoryRateLimiter, RateDecision, RateLimitStore, body_size_middleware,
    cron_auth_middleware, logging_middleware, rate_limit_middleware,
    security_headers_middleware,
};

/// Shared state for every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub engine: GovernanceEngine,
    pub identity: Arc<dyn IdentityResolver>,
    pub rate_limiter: Arc<dyn RateLimitStore>,
    pub cron_secret: Arc<str>,
    pub webhook_secret: Arc<str>,
    pub max_request_size: usize,
    pub log_requests: bool,
    pub sanitize_logs: bool,
}

impl AppState {
    /// Store-backed identity and an in-memory rate limiter from `config`.
    pub fn new(engine: GovernanceEngine, config: &GovernanceConfig) -> Self {
        let identity = Arc::new(StoreIdentityResolver::new(engine.store.clone()));
        let rate_limiter = Arc::new(InMemoryRateLimiter::new(
            config.security.rate_limit_requests,
            Duration::from_secs(config.security.rate_limit_window_secs),
        ));
        Self {
            engine,
            identity,
            rate_limiter,
            cron_secret: Arc::from(config.security.cron_secret.as_str()),
            webhook_secret: Arc::from(config.security.webhook_secret.as_str()),
            max_request_size: config.security.max_request_size,
            log_requests: config.logging.log_requests,
            sanitize_logs: config.logging.sanitize_logs,
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the full router.
pub fn create_router(state: AppState) -> Router {
    // Endpoints that start outreach or call external services
    let triggers = Router::new()
        .route(
            "/experts/{id}/contact-attempt",
            post(experts::record_contact_attempt),
        )
        .route("/experts/{id}/rate-estimate", post(experts::estimate_rate))
        .route("/projects/{id}/ranking", get(experts::project_ranking))
        .route(
            "/admin/liquidity/trigger-scrape",
            post(admin::trigger_scrape),
        )
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let cron = Router::new()
        .route("/cron/expire-ownership", post(jobs::expire_ownership))
        .route("/cron/no-spam-auditor", post(jobs::no_spam_audit))
        .route_layer(from_fn_with_state(state.clone(), cron_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/experts", post(experts::register_expert))
        .route("/experts/{id}", get(experts::get_expert))
        .route("/experts/{id}/repute", post(experts::recompute_reputation))
        .route("/experts/{id}/privacy", patch(experts::set_privacy))
        .route("/experts/{id}/engagements", post(experts::log_engagement))
        .route("/experts/{id}/authority", put(experts::set_authority))
        .route("/tickets", post(tickets::open_ticket))
        .route("/tickets/{id}/approve", post(tickets::approve_ticket))
        .route("/tickets/{id}/reject", post(tickets::reject_ticket))
        .route(
            "/admin/experts/{id}/force-expire",
            patch(admin::force_expire),
        )
        .route("/admin/experts/{id}/reassign", patch(admin::reassign))
        .route("/admin/bulk-reclaim", post(admin::bulk_reclaim))
        .route("/admin/decay", get(admin::decay_forecast))
        .route("/admin/decay/config", patch(admin::update_decay_config))
        .route("/admin/settings", get(admin::get_settings))
        .route(
            "/admin/settings/ml-sensitivity",
            patch(admin::update_ml_sensitivity),
        )
        .route("/admin/liquidity", get(admin::liquidity_report))
        .route("/admin/audit", get(admin::audit_log))
        .route("/admin/users/{id}/role", patch(admin::set_user_role))
        .route("/admin/tickets", get(admin::open_tickets))
        .route("/webhooks/workflow-callback", post(jobs::workflow_callback))
        .merge(triggers)
        .merge(cron)
        // Outermost layer runs first
        .layer(from_fn_with_state(state.clone(), body_size_middleware))
        .layer(from_fn_with_state(state.clone(), logging_middleware))
        .layer(from_fn(security_headers_middleware))
        .with_state(state)
}
