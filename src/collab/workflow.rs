//! Workflow-automation collaborator.
//!
//! Scrape runs are started with a signed JSON webhook. The signature is
//! computed over the exact bytes sent.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::collab::http::SecureHttpClient;
use crate::collab::signing::{sign, OUTBOUND_SIGNATURE_HEADER};
use crate::error::{GovernanceError, GovernanceResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeRequest {
    pub signal_id: String,
    pub industry: String,
    pub sub_industry: String,
    pub region: String,
    pub requested_by: String,
}

#[async_trait]
pub trait WorkflowDispatch: Send + Sync {
    async fn start_scrape(&self, request: &ScrapeRequest) -> GovernanceResult<()>;
}

/// Stand-in when no workflow webhook is configured.
pub struct DisabledWorkflow;

#[async_trait]
impl WorkflowDispatch for DisabledWorkflow {
    async fn start_scrape(&self, _request: &ScrapeRequest) -> GovernanceResult<()> {
        Err(GovernanceError::UpstreamUnavailable(
            "workflow automation is not configured".to_string(),
        ))
    }
}

pub struct WebhookWorkflowClient {
    http: SecureHttpClient,
    webhook_url: String,
    secret: String,
}

impl WebhookWorkflowClient {
    pub fn new(http: SecureHttpClient, webhook_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl WorkflowDispatch for WebhookWorkflowClient {
    async fn start_scrape(&self, request: &ScrapeRequest) -> GovernanceResult<()> {
        let body = serde_json::to_vec(request)
            .map_err(|e| GovernanceError::Internal(format!("encode scrape request: {}", e)))?;
        let signature = sign(self.secret.as_bytes(), &body);

        self.http
            .post_json(
                &self.webhook_url,
                body,
                &[(OUTBOUND_SIGNATURE_HEADER, signature)],
            )
            .await
            .map_err(|e| {
                GovernanceError::UpstreamUnavailable(format!("workflow webhook failed: {}", e))
            })?;

        info!(signal_id = %request.signal_id, "Started replenishment scrape");
        Ok(())
    }
}
