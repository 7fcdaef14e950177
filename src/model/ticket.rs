use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ownership transfer request status. Everything but `Open` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    Approved,
    Rejected,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Resolved => "RESOLVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(Self::Open),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "RESOLVED" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Terminal outcomes counted as satisfied by the reputation scorer.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Approved | Self::Resolved)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub expert_id: String,
    pub requester_id: String,
    pub owner_id: Option<String>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn open(
        id: String,
        expert_id: String,
        requester_id: String,
        owner_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            expert_id,
            requester_id,
            owner_id,
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record of an administrative override, created already resolved.
    pub fn resolved_override(
        id: String,
        expert_id: String,
        admin_id: String,
        new_owner_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            expert_id,
            requester_id: admin_id,
            owner_id: Some(new_owner_id),
            status: TicketStatus::Resolved,
            created_at: now,
            updated_at: now,
        }
    }
}
