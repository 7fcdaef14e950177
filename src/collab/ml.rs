//! ML scoring collaborator.
//!
//! Remote calls go through a circuit breaker: one failure opens it for a
//! fixed period, during which calls fail fast. Rate estimates fall back to
//! the expert's own booking history; rankings have no fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::collab::http::SecureHttpClient;
use crate::database::GovernanceStore;
use crate::error::{GovernanceError, GovernanceResult};
use crate::governance::SettingsService;
use crate::model::{Caller, Expert};
use crate::reputation::round2;

/// Spread applied around the historical average in the fallback estimate.
pub const FALLBACK_SPREAD: f64 = 0.2;

#[derive(Debug, Clone, Serialize)]
pub struct RateFeatures {
    pub expert_id: String,
    pub industry: String,
    pub sub_industry: String,
    pub region: String,
    pub seniority_score: Option<f64>,
    pub years_experience: Option<f64>,
    pub average_actual_rate: f64,
    pub total_engagements: u32,
    pub sensitivity: f64,
}

impl RateFeatures {
    pub fn from_expert(expert: &Expert, sensitivity: f64) -> Self {
        Self {
            expert_id: expert.id.clone(),
            industry: expert.profile.industry.clone(),
            sub_industry: expert.profile.sub_industry.clone(),
            region: expert.profile.region.clone(),
            seniority_score: expert.profile.seniority_score,
            years_experience: expert.profile.years_experience,
            average_actual_rate: expert.aggregates.average_actual_rate,
            total_engagements: expert.aggregates.total_engagements,
            sensitivity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePrediction {
    pub min: f64,
    pub max: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Model,
    FeedbackLoop,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateEstimate {
    pub expert_id: String,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
    pub predicted_rate: Option<f64>,
    pub source: EstimateSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedExpert {
    pub expert_id: String,
    pub confidence_score: f64,
}

#[async_trait]
pub trait MlScoring: Send + Sync {
    async fn predict_rate(&self, features: &RateFeatures) -> GovernanceResult<RatePrediction>;

    async fn rank(&self, project_id: &str) -> GovernanceResult<Vec<RankedExpert>>;
}

/// Stand-in when no ML service is configured.
pub struct DisabledMl;

#[async_trait]
impl MlScoring for DisabledMl {
    async fn predict_rate(&self, _features: &RateFeatures) -> GovernanceResult<RatePrediction> {
        Err(GovernanceError::UpstreamUnavailable(
            "ML scoring is not configured".to_string(),
        ))
    }

    async fn rank(&self, _project_id: &str) -> GovernanceResult<Vec<RankedExpert>> {
        Err(GovernanceError::UpstreamUnavailable(
            "ML scoring is not configured".to_string(),
        ))
    }
}

/// Opens for `open_for` after any failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    open_for: Duration,
    open_until: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(open_for: Duration) -> Self {
        Self {
            open_for,
            open_until: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        match self.open_until.lock() {
            Ok(guard) => guard.is_some_and(|until| Instant::now() < until),
            Err(_) => false,
        }
    }

    pub fn trip(&self) {
        if let Ok(mut guard) = self.open_until.lock() {
            *guard = Some(Instant::now() + self.open_for);
        }
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.open_until.lock() {
            *guard = None;
        }
    }
}

pub struct HttpMlClient {
    http: SecureHttpClient,
    base_url: String,
    breaker: CircuitBreaker,
}

impl HttpMlClient {
    pub fn new(http: SecureHttpClient, base_url: impl Into<String>, open_for: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            breaker: CircuitBreaker::new(open_for),
        }
    }

    async fn call<B, R>(&self, path: &str, body: &B) -> GovernanceResult<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de> + Send,
    {
        if self.breaker.is_open() {
            return Err(GovernanceError::UpstreamUnavailable(
                "ML circuit is open".to_string(),
            ));
        }

        let url = format!("{}{}", self.base_url, path);
        let body = serde_json::to_vec(body)
            .map_err(|e| GovernanceError::Internal(format!("encode ML request: {}", e)))?;
        let result = self
            .http
            .post_json(&url, body, &[])
            .await
            .and_then(|text| serde_json::from_str::<R>(&text).map_err(anyhow::Error::from));

        match result {
            Ok(parsed) => {
                self.breaker.reset();
                Ok(parsed)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "ML call failed, opening circuit");
                self.breaker.trip();
                Err(GovernanceError::UpstreamUnavailable(format!(
                    "ML service call failed: {}",
                    e
                )))
            }
        }
    }
}

#[derive(Serialize)]
struct RankRequest<'a> {
    project_id: &'a str,
}

#[derive(Deserialize)]
struct RankResponse {
    experts: Vec<RankedExpert>,
}

#[async_trait]
impl MlScoring for HttpMlClient {
    async fn predict_rate(&self, features: &RateFeatures) -> GovernanceResult<RatePrediction> {
        self.call("/predict-rate", features).await
    }

    async fn rank(&self, project_id: &str) -> GovernanceResult<Vec<RankedExpert>> {
        let response: RankResponse = self.call("/rank", &RankRequest { project_id }).await?;
        Ok(response.experts)
    }
}

/// Deterministic estimate from booking history, labeled as such.
pub fn fallback_estimate(expert: &Expert) -> RateEstimate {
    let average = expert.aggregates.average_actual_rate;
    if average > 0.0 {
        RateEstimate {
            expert_id: expert.id.clone(),
            min_rate: Some(round2(average * (1.0 - FALLBACK_SPREAD))),
            max_rate: Some(round2(average * (1.0 + FALLBACK_SPREAD))),
            predicted_rate: Some(round2(average)),
            source: EstimateSource::FeedbackLoop,
        }
    } else {
        RateEstimate {
            expert_id: expert.id.clone(),
            min_rate: None,
            max_rate: None,
            predicted_rate: None,
            source: EstimateSource::Unavailable,
        }
    }
}

/// Rate estimates and project rankings for callers.
#[derive(Clone)]
pub struct RateAdvisor {
    ml: Arc<dyn MlScoring>,
    store: Arc<dyn GovernanceStore>,
    settings: SettingsService,
}

impl RateAdvisor {
    pub fn new(
        ml: Arc<dyn MlScoring>,
        store: Arc<dyn GovernanceStore>,
        settings: SettingsService,
    ) -> Self {
        Self {
            ml,
            store,
            settings,
        }
    }

    pub async fn estimate(&self, caller: &Caller, expert_id: &str) -> GovernanceResult<RateEstimate> {
        let expert = self
            .store
            .get_expert(expert_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("expert {}", expert_id)))?;
        let sensitivity = self.settings.current().await?.ml_sensitivity;

        match self
            .ml
            .predict_rate(&RateFeatures::from_expert(&expert, sensitivity))
            .await
        {
            Ok(prediction) => {
                debug!(expert_id = %expert_id, caller = %caller.user_id, "Model rate estimate");
                Ok(RateEstimate {
                    expert_id: expert.id,
                    min_rate: Some(prediction.min),
                    max_rate: Some(prediction.max),
                    predicted_rate: Some(prediction.predicted),
                    source: EstimateSource::Model,
                })
            }
            Err(GovernanceError::UpstreamUnavailable(reason)) => {
                warn!(expert_id = %expert_id, reason = %reason, "Using feedback-loop rate estimate");
                Ok(fallback_estimate(&expert))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn rank(&self, project_id: &str) -> GovernanceResult<Vec<RankedExpert>> {
        if project_id.trim().is_empty() {
            return Err(GovernanceError::validation("project id is required"));
        }
        self.ml.rank(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExpertProfile;
    use chrono::Utc;

    fn expert_with_average(average: f64) -> Expert {
        let now = Utc::now();
        let mut expert = Expert::new_private(
            "e1".into(),
            ExpertProfile::default(),
            "u1".into(),
            now,
            now,
        );
        expert.aggregates.average_actual_rate = average;
        expert
    }

    #[test]
    fn test_fallback_spreads_twenty_percent() {
        let estimate = fallback_estimate(&expert_with_average(500.0));
        assert_eq!(estimate.source, EstimateSource::FeedbackLoop);
        assert_eq!(estimate.min_rate, Some(400.0));
        assert_eq!(estimate.max_rate, Some(600.0));
        assert_eq!(estimate.predicted_rate, Some(500.0));
    }

    #[test]
    fn test_fallback_without_history_is_unavailable() {
        let estimate = fallback_estimate(&expert_with_average(0.0));
        assert_eq!(estimate.source, EstimateSource::Unavailable);
        assert!(estimate.predicted_rate.is_none());
    }

    #[test]
    fn test_circuit_breaker_opens_and_resets() {
        let breaker = CircuitBreaker::new(Duration::from_secs(30));
        assert!(!breaker.is_open());
        breaker.trip();
        assert!(breaker.is_open());
        breaker.reset();
        assert!(!breaker.is_open());

        let short = CircuitBreaker::new(Duration::ZERO);
        short.trip();
        assert!(!short.is_open());
    }
}
