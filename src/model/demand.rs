use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DemandStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl DemandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Signals still waiting on supply.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// A research request expressing demand for a segment of experts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSignal {
    pub id: String,
    pub title: String,
    pub industry: String,
    pub sub_industry: String,
    pub region: String,
    pub status: DemandStatus,
    pub created_at: DateTime<Utc>,
}

/// Segment criteria supplied when requesting replenishment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentCriteria {
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub sub_industry: String,
    #[serde(default)]
    pub region: String,
}

impl SegmentCriteria {
    pub fn is_empty(&self) -> bool {
        self.industry.trim().is_empty()
            && self.sub_industry.trim().is_empty()
            && self.region.trim().is_empty()
    }
}

/// Pooled supply profile used by the liquidity analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyProfile {
    pub expert_id: String,
    pub industry: String,
    pub sub_industry: String,
    pub region: String,
}
