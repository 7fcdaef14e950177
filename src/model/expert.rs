//! Expert records and their visibility state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Who may see and claim an expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibilityStatus {
    /// Exclusively held by one owner until the expiry lapses
    Private,
    /// Claimable by any qualifying user
    GlobalPool,
}

impl VisibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::GlobalPool => "GLOBAL_POOL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRIVATE" => Some(Self::Private),
            "GLOBAL_POOL" => Some(Self::GlobalPool),
            _ => None,
        }
    }
}

impl fmt::Display for VisibilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MnpiRiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl MnpiRiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactType {
    Email,
    Phone,
    Linkedin,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "type")]
    pub kind: ContactType,
    pub value: String,
    #[serde(default)]
    pub is_verified: bool,
}

/// Descriptive profile fields, supplied on registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpertProfile {
    pub name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub sub_industry: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub seniority_score: Option<f64>,
    #[serde(default)]
    pub years_experience: Option<f64>,
    #[serde(default)]
    pub predicted_rate: Option<f64>,
    #[serde(default)]
    pub past_employers: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

/// Spend and engagement aggregates maintained by the knowledge loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementAggregates {
    pub total_engagements: u32,
    pub average_actual_rate: f64,
    pub subject_frequency_map: BTreeMap<String, u32>,
    pub reliability_index: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expert {
    pub id: String,
    #[serde(flatten)]
    pub profile: ExpertProfile,
    pub owner_id: Option<String>,
    pub visibility_status: VisibilityStatus,
    pub private_expires_at: Option<DateTime<Utc>>,
    pub last_contact_update: Option<DateTime<Utc>>,
    pub reputation_score: f64,
    pub compliance_score: Option<f64>,
    pub mnpi_risk_level: MnpiRiskLevel,
    pub professional_authority_index: Option<f64>,
    pub citation_count: Option<u32>,
    pub patent_count: Option<u32>,
    #[serde(flatten)]
    pub aggregates: EngagementAggregates,
    pub contact_cloaked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expert {
    /// A freshly registered expert, exclusively held by `owner_id` until `expires_at`.
    pub fn new_private(
        id: String,
        profile: ExpertProfile,
        owner_id: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            profile,
            owner_id: Some(owner_id),
            visibility_status: VisibilityStatus::Private,
            private_expires_at: Some(expires_at),
            last_contact_update: None,
            reputation_score: 0.0,
            compliance_score: None,
            mnpi_risk_level: MnpiRiskLevel::Low,
            professional_authority_index: None,
            citation_count: None,
            patent_count: None,
            aggregates: EngagementAggregates::default(),
            contact_cloaked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_private(&self) -> bool {
        self.visibility_status == VisibilityStatus::Private
    }

    pub fn has_verified_contact(&self) -> bool {
        self.profile.contacts.iter().any(|c| c.is_verified)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id.as_deref() == Some(user_id)
    }

    /// PRIVATE records must carry both an owner and an expiry.
    pub fn holds_visibility_invariant(&self) -> bool {
        match self.visibility_status {
            VisibilityStatus::Private => {
                self.owner_id.is_some() && self.private_expires_at.is_some()
            }
            VisibilityStatus::GlobalPool => true,
        }
    }

    /// Copy with contact values masked, for callers who may not see them.
    pub fn cloaked(&self) -> Self {
        let mut copy = self.clone();
        for contact in copy.profile.contacts.iter_mut() {
            contact.value = mask_contact(&contact.value);
        }
        copy
    }
}

fn mask_contact(value: &str) -> String {
    let visible: String = value.chars().take(2).collect();
    format!("{}***", visible)
}
