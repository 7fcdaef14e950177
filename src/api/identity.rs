//! Caller identity resolution.
//!
//! The upstream identity provider forwards the authenticated user id in the
//! `x-user-id` header; the role is always read from the store, never trusted
//! from the request.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use tracing::debug;

use crate::api::AppState;
use crate::database::GovernanceStore;
use crate::error::{GovernanceError, GovernanceResult};
use crate::model::Caller;

pub const USER_ID_HEADER: &str = "x-user-id";

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` when the identity is unknown.
    async fn resolve(&self, user_id: &str) -> GovernanceResult<Option<Caller>>;
}

/// Looks callers up in the governance store.
pub struct StoreIdentityResolver {
    store: Arc<dyn GovernanceStore>,
}

impl StoreIdentityResolver {
    pub fn new(store: Arc<dyn GovernanceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityResolver for StoreIdentityResolver {
    async fn resolve(&self, user_id: &str) -> GovernanceResult<Option<Caller>> {
        Ok(self
            .store
            .get_user(user_id)
            .await?
            .map(|user| Caller::new(user.id, user.role)))
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = GovernanceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(GovernanceError::Unauthorized)?;

        match state.identity.resolve(user_id).await? {
            Some(caller) => Ok(caller),
            None => {
                debug!(user_id = %user_id, "Unknown caller identity");
                Err(GovernanceError::Unauthorized)
            }
        }
    }
}
