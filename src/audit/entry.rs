//! Audit record types.
//!
//! Metadata is a tagged union keyed by the action kind so each payload is
//! statically known. Rows written by newer versions with unknown kinds still
//! load through the `Generic` variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::model::{Role, TicketStatus};

/// Enumerated audit action tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ForceExpire,
    AutoExpiry,
    OwnershipChange,
    BulkReclaim,
    ProfileEdit,
    VisibilityDemotion,
    ConfigChange,
    TicketDecision,
    #[serde(other)]
    Unknown,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForceExpire => "FORCE_EXPIRE",
            Self::AutoExpiry => "AUTO_EXPIRY",
            Self::OwnershipChange => "OWNERSHIP_CHANGE",
            Self::BulkReclaim => "BULK_RECLAIM",
            Self::ProfileEdit => "PROFILE_EDIT",
            Self::VisibilityDemotion => "VISIBILITY_DEMOTION",
            Self::ConfigChange => "CONFIG_CHANGE",
            Self::TicketDecision => "TICKET_DECISION",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "FORCE_EXPIRE" => Self::ForceExpire,
            "AUTO_EXPIRY" => Self::AutoExpiry,
            "OWNERSHIP_CHANGE" => Self::OwnershipChange,
            "BULK_RECLAIM" => Self::BulkReclaim,
            "PROFILE_EDIT" => Self::ProfileEdit,
            "VISIBILITY_DEMOTION" => Self::VisibilityDemotion,
            "CONFIG_CHANGE" => Self::ConfigChange,
            "TICKET_DECISION" => Self::TicketDecision,
            _ => Self::Unknown,
        }
    }

    /// Severity used when mirroring the entry into the tracing log.
    pub fn severity(&self) -> AuditSeverity {
        match self {
            Self::ForceExpire | Self::BulkReclaim | Self::VisibilityDemotion => {
                AuditSeverity::Warning
            }
            _ => AuditSeverity::Info,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditSeverity {
    Info,
    Warning,
}

/// Per-action payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditMetadata {
    ForceExpire {
        previous_owner_id: Option<String>,
        manual_override: bool,
    },
    AutoExpiry {
        previous_owner_id: Option<String>,
        expert_name: String,
    },
    OwnershipChange {
        previous_owner_id: Option<String>,
        new_owner_id: String,
        ticket_id: String,
        resolved_by_admin: bool,
    },
    BulkReclaim {
        expert_ids: Vec<String>,
        new_owner_id: String,
        count: usize,
    },
    ProfileEdit {
        field: String,
        new_value: Value,
    },
    VisibilityDemotion {
        attempts: u64,
        bookings: u64,
        window_days: u32,
    },
    ConfigChange {
        key: String,
        previous_value: Option<Value>,
        new_value: Value,
    },
    TicketDecision {
        ticket_id: String,
        decision: TicketStatus,
    },
    #[serde(untagged)]
    Generic(Map<String, Value>),
}

impl AuditMetadata {
    pub fn action(&self) -> AuditAction {
        match self {
            Self::ForceExpire { .. } => AuditAction::ForceExpire,
            Self::AutoExpiry { .. } => AuditAction::AutoExpiry,
            Self::OwnershipChange { .. } => AuditAction::OwnershipChange,
            Self::BulkReclaim { .. } => AuditAction::BulkReclaim,
            Self::ProfileEdit { .. } => AuditAction::ProfileEdit,
            Self::VisibilityDemotion { .. } => AuditAction::VisibilityDemotion,
            Self::ConfigChange { .. } => AuditAction::ConfigChange,
            Self::TicketDecision { .. } => AuditAction::TicketDecision,
            Self::Generic(fields) => fields
                .get("kind")
                .and_then(Value::as_str)
                .map(AuditAction::parse)
                .unwrap_or(AuditAction::Unknown),
        }
    }

    pub fn role_change(role: Role) -> Self {
        Self::ProfileEdit {
            field: "role".to_string(),
            new_value: Value::String(role.as_str().to_string()),
        }
    }

    pub fn profile_edit(field: &str, new_value: Value) -> Self {
        Self::ProfileEdit {
            field: field.to_string(),
            new_value,
        }
    }
}

/// Audit row as requested by a mutation, before the store stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditAppend {
    pub actor_id: Option<String>,
    pub target_id: Option<String>,
    pub metadata: AuditMetadata,
}

impl AuditAppend {
    pub fn new(metadata: AuditMetadata) -> Self {
        Self {
            actor_id: None,
            target_id: None,
            metadata,
        }
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn on(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn stamp(self, id: String, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            actor_id: self.actor_id,
            target_id: self.target_id,
            action: self.metadata.action(),
            metadata: self.metadata,
            created_at,
        }
    }
}

/// Immutable stored audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub actor_id: Option<String>,
    pub target_id: Option<String>,
    pub action: AuditAction,
    pub metadata: AuditMetadata,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_AUDIT_LIMIT: usize = 100;
pub const MAX_AUDIT_LIMIT: usize = 500;

/// Audit log filter. All set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AuditQuery {
    pub actor_id: Option<String>,
    pub target_id: Option<String>,
    pub action: Option<AuditAction>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn for_action(action: AuditAction, limit: usize) -> Self {
        Self {
            action: Some(action),
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Effective limit, defaulted and capped at `max`.
    pub fn effective_limit(&self, max: usize) -> usize {
        self.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, max)
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.actor_id
            .as_ref()
            .is_none_or(|a| entry.actor_id.as_ref() == Some(a))
            && self
                .target_id
                .as_ref()
                .is_none_or(|t| entry.target_id.as_ref() == Some(t))
            && self.action.is_none_or(|a| entry.action == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_is_tagged_by_kind() {
        let meta = AuditMetadata::ForceExpire {
            previous_owner_id: Some("u1".into()),
            manual_override: true,
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["kind"], "FORCE_EXPIRE");
        assert_eq!(value["manual_override"], true);

        let back: AuditMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_unknown_kind_falls_back_to_generic() {
        let value = json!({"kind": "EXPORT", "rows": 12});
        let meta: AuditMetadata = serde_json::from_value(value).unwrap();
        assert!(matches!(meta, AuditMetadata::Generic(_)));
        assert_eq!(meta.action(), AuditAction::Unknown);
    }

    #[test]
    fn test_query_limit_defaults_and_caps() {
        assert_eq!(AuditQuery::default().effective_limit(MAX_AUDIT_LIMIT), 100);
        let q = AuditQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(q.effective_limit(MAX_AUDIT_LIMIT), 500);
    }

    #[test]
    fn test_query_matching() {
        let entry = AuditAppend::new(AuditMetadata::role_change(Role::Admin))
            .by("admin")
            .on("u7")
            .stamp("a1".into(), Utc::now());

        assert!(AuditQuery::default().matches(&entry));
        assert!(AuditQuery::for_action(AuditAction::ProfileEdit, 5).matches(&entry));
        assert!(!AuditQuery::for_action(AuditAction::ForceExpire, 5).matches(&entry));
        let by_other = AuditQuery {
            actor_id: Some("someone".into()),
            ..Default::default()
        };
        assert!(!by_other.matches(&entry));
    }
}
