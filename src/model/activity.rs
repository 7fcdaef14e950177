//! Contact attempts and completed engagements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GovernanceError, GovernanceResult};

/// One outreach attempt, read only through rolling windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactAttempt {
    pub id: String,
    pub expert_id: String,
    pub created_at: DateTime<Utc>,
}

/// A completed, billed engagement ("booking").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: String,
    pub expert_id: String,
    pub project_id: String,
    pub subject_matter: String,
    pub actual_cost: f64,
    pub client_feedback_score: u8,
    pub date: DateTime<Utc>,
    pub duration_minutes: u32,
}

/// Input for the knowledge loop, validated at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEngagement {
    pub project_id: String,
    pub subject_matter: String,
    pub actual_cost: f64,
    pub client_feedback_score: u8,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
}

impl NewEngagement {
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(GovernanceError::validation("project_id is required"));
        }
        if self.subject_matter.trim().is_empty() {
            return Err(GovernanceError::validation("subject_matter is required"));
        }
        if !(1..=5).contains(&self.client_feedback_score) {
            return Err(GovernanceError::validation(
                "client_feedback_score must be between 1 and 5",
            ));
        }
        if !self.actual_cost.is_finite() || self.actual_cost < 0.0 {
            return Err(GovernanceError::validation(
                "actual_cost must be a non-negative amount",
            ));
        }
        Ok(())
    }

    pub fn into_engagement(self, id: String, expert_id: String, now: DateTime<Utc>) -> Engagement {
        Engagement {
            id,
            expert_id,
            project_id: self.project_id,
            subject_matter: self.subject_matter.trim().to_string(),
            actual_cost: self.actual_cost,
            client_feedback_score: self.client_feedback_score,
            date: self.date.unwrap_or(now),
            duration_minutes: self.duration_minutes,
        }
    }
}
