//! Guarded write batches.
//!
//! A batch is the unit of atomicity: guards are checked against current state
//! under the store's lock (or row locks), then every write and audit append is
//! applied. A single failed guard rejects the whole batch with a conflict.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::audit::{AuditAppend, AuditEntry};
use crate::model::{
    ContactAttempt, DemandSignal, DemandStatus, Engagement, Expert, Role, Ticket, TicketStatus,
    User, VisibilityStatus,
};

/// Precondition that must still hold when the batch commits.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// Expert is currently in `expected`
    Visibility {
        expert_id: String,
        expected: VisibilityStatus,
    },
    /// Expert owner is unchanged since it was read
    Owner {
        expert_id: String,
        expected: Option<String>,
    },
    /// Expert's private expiry is at or before `at`
    ExpiredBy { expert_id: String, at: DateTime<Utc> },
    /// Authority index has never been written
    AuthorityUnset { expert_id: String },
    TicketStatus {
        ticket_id: String,
        expected: TicketStatus,
    },
    NoOpenTicket { expert_id: String },
}

impl Guard {
    /// Expert row this guard inspects, if any.
    pub fn expert_id(&self) -> Option<&str> {
        match self {
            Self::Visibility { expert_id, .. }
            | Self::Owner { expert_id, .. }
            | Self::ExpiredBy { expert_id, .. }
            | Self::AuthorityUnset { expert_id }
            | Self::NoOpenTicket { expert_id } => Some(expert_id),
            Self::TicketStatus { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertUser(User),
    InsertExpert(Box<Expert>),
    /// PRIVATE -> GLOBAL_POOL; the previous owner id is retained for history
    ReleaseToPool {
        expert_id: String,
        at: DateTime<Utc>,
    },
    /// GLOBAL_POOL -> PRIVATE with an owner and fresh expiry
    ClaimPrivate {
        expert_id: String,
        owner_id: String,
        expires_at: DateTime<Utc>,
    },
    /// Ownership change without a visibility transition
    SetOwner {
        expert_id: String,
        owner_id: String,
        expires_at: Option<DateTime<Utc>>,
    },
    InsertTicket(Ticket),
    SetTicketStatus {
        ticket_id: String,
        status: TicketStatus,
        owner_id: Option<String>,
        at: DateTime<Utc>,
    },
    SetUserRole {
        user_id: String,
        role: Role,
    },
    SetAuthority {
        expert_id: String,
        citation_count: u32,
        patent_count: u32,
        index: f64,
    },
    SetContactCloak {
        expert_id: String,
        cloaked: bool,
    },
    InsertContactAttempt(ContactAttempt),
    InsertEngagement(Engagement),
    /// Recompute engagement aggregates from all stored engagements
    RecomputeEngagementAggregates { expert_id: String },
    /// Recompute the reputation score from state as of this point in the batch
    RecomputeReputation { expert_id: String },
    UpsertConfig {
        key: String,
        value: Value,
    },
    InsertDemandSignal(DemandSignal),
    SetDemandStatus {
        signal_id: String,
        status: DemandStatus,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub guards: Vec<Guard>,
    pub writes: Vec<Write>,
    pub audit: Vec<AuditAppend>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn write(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    pub fn audit(mut self, append: AuditAppend) -> Self {
        self.audit.push(append);
        self
    }

    pub fn push_guard(&mut self, guard: Guard) {
        self.guards.push(guard);
    }

    pub fn push_write(&mut self, write: Write) {
        self.writes.push(write);
    }

    /// Fold another batch into this one; both commit together.
    pub fn extend(&mut self, other: WriteBatch) {
        self.guards.extend(other.guards);
        self.writes.extend(other.writes);
        self.audit.extend(other.audit);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.audit.is_empty()
    }

    /// Guarded expert ids, sorted and deduplicated.
    ///
    /// Stores that take row locks acquire them in this order so overlapping
    /// batches cannot deadlock.
    pub fn locked_expert_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .guards
            .iter()
            .filter_map(Guard::expert_id)
            .map(str::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    pub audit: Vec<AuditEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_expert_ids_sorted_and_unique() {
        let batch = WriteBatch::new()
            .guard(Guard::Visibility {
                expert_id: "e9".into(),
                expected: VisibilityStatus::GlobalPool,
            })
            .guard(Guard::TicketStatus {
                ticket_id: "t1".into(),
                expected: TicketStatus::Open,
            })
            .guard(Guard::Owner {
                expert_id: "e2".into(),
                expected: None,
            })
            .guard(Guard::NoOpenTicket {
                expert_id: "e9".into(),
            });

        assert_eq!(batch.locked_expert_ids(), vec!["e2".to_string(), "e9".to_string()]);
        assert!(WriteBatch::new().locked_expert_ids().is_empty());
    }
}
