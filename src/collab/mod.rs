//! External collaborators: ML scoring and workflow automation, plus the
//! HMAC signing shared by outbound webhooks and inbound callbacks.

pub mod http;
pub mod ml;
pub mod signing;
pub mod workflow;

pub use http::{HttpSecurityConfig, SecureHttpClient};
pub use ml::{
    fallback_estimate, CircuitBreaker, DisabledMl, EstimateSource, HttpMlClient, MlScoring,
    RankedExpert, RateAdvisor, RateEstimate, RateFeatures, RatePrediction,
};
pub use workflow::{DisabledWorkflow, ScrapeRequest, WebhookWorkflowClient, WorkflowDispatch};
