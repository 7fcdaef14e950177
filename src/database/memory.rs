//! In-memory store.
//!
//! Commits run under a single write lock. Writes apply in place while an undo
//! journal records the prior value of every entity they touch; a failed write
//! or invariant check replays the journal before the lock is released, so
//! readers never observe a half-applied batch. Commit cost follows the size
//! of the batch, not the size of the history. Suitable for tests and
//! single-instance runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use crate::audit::{AuditEntry, AuditQuery};
use crate::database::{
    CommitReceipt, ExpiringExpert, GovernanceStore, Guard, StoreError, StoreResult, Write,
    WriteBatch,
};
use crate::model::{
    new_id, ContactAttempt, DemandSignal, Engagement, Expert, SupplyProfile, Ticket, TicketStatus,
    User, VisibilityStatus,
};
use crate::reputation::{aggregate_engagements, score_expert};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<String, User>,
    experts: HashMap<String, Expert>,
    tickets: Vec<Ticket>,
    contact_attempts: Vec<ContactAttempt>,
    engagements: Vec<Engagement>,
    config: HashMap<String, Value>,
    demand_signals: Vec<DemandSignal>,
    audit: Vec<AuditEntry>,
}

/// Prior values of everything a batch has touched so far.
///
/// Collections that only grow are restored by truncation; the first recorded
/// prior wins, so it always holds the pre-batch value.
#[derive(Debug)]
struct UndoJournal {
    users: HashMap<String, Option<User>>,
    experts: HashMap<String, Option<Expert>>,
    tickets: HashMap<usize, Ticket>,
    demand_signals: HashMap<usize, DemandSignal>,
    config: HashMap<String, Option<Value>>,
    tickets_len: usize,
    contact_attempts_len: usize,
    engagements_len: usize,
    demand_signals_len: usize,
}

impl UndoJournal {
    fn begin(state: &MemoryState) -> Self {
        Self {
            users: HashMap::new(),
            experts: HashMap::new(),
            tickets: HashMap::new(),
            demand_signals: HashMap::new(),
            config: HashMap::new(),
            tickets_len: state.tickets.len(),
            contact_attempts_len: state.contact_attempts.len(),
            engagements_len: state.engagements.len(),
            demand_signals_len: state.demand_signals.len(),
        }
    }

    fn record_user(&mut self, state: &MemoryState, user_id: &str) {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| state.users.get(user_id).cloned());
    }

    fn record_expert(&mut self, state: &MemoryState, expert_id: &str) {
        self.experts
            .entry(expert_id.to_string())
            .or_insert_with(|| state.experts.get(expert_id).cloned());
    }

    /// Capture whatever `write` is about to mutate in place.
    fn record(&mut self, state: &MemoryState, write: &Write) {
        match write {
            Write::InsertUser(user) => self.record_user(state, &user.id),
            Write::SetUserRole { user_id, .. } => self.record_user(state, user_id),
            Write::InsertExpert(expert) => self.record_expert(state, &expert.id),
            Write::ReleaseToPool { expert_id, .. }
            | Write::ClaimPrivate { expert_id, .. }
            | Write::SetOwner { expert_id, .. }
            | Write::SetAuthority { expert_id, .. }
            | Write::SetContactCloak { expert_id, .. }
            | Write::RecomputeEngagementAggregates { expert_id }
            | Write::RecomputeReputation { expert_id } => self.record_expert(state, expert_id),
            Write::SetTicketStatus { ticket_id, .. } => {
                if let Some(index) = state.tickets.iter().position(|t| &t.id == ticket_id) {
                    self.tickets
                        .entry(index)
                        .or_insert_with(|| state.tickets[index].clone());
                }
            }
            Write::SetDemandStatus { signal_id, .. } => {
                if let Some(index) = state.demand_signals.iter().position(|s| &s.id == signal_id) {
                    self.demand_signals
                        .entry(index)
                        .or_insert_with(|| state.demand_signals[index].clone());
                }
            }
            Write::UpsertConfig { key, .. } => {
                self.config
                    .entry(key.clone())
                    .or_insert_with(|| state.config.get(key).cloned());
            }
            Write::InsertTicket(_)
            | Write::InsertContactAttempt(_)
            | Write::InsertEngagement(_)
            | Write::InsertDemandSignal(_) => {}
        }
    }

    fn rollback(self, state: &mut MemoryState) {
        state.tickets.truncate(self.tickets_len);
        state.contact_attempts.truncate(self.contact_attempts_len);
        state.engagements.truncate(self.engagements_len);
        state.demand_signals.truncate(self.demand_signals_len);

        for (index, ticket) in self.tickets {
            if let Some(slot) = state.tickets.get_mut(index) {
                *slot = ticket;
            }
        }
        for (index, signal) in self.demand_signals {
            if let Some(slot) = state.demand_signals.get_mut(index) {
                *slot = signal;
            }
        }
        restore(&mut state.users, self.users);
        restore(&mut state.experts, self.experts);
        restore(&mut state.config, self.config);
    }
}

fn restore<T>(map: &mut HashMap<String, T>, priors: HashMap<String, Option<T>>) {
    for (key, prior) in priors {
        match prior {
            Some(value) => {
                map.insert(key, value);
            }
            None => {
                map.remove(&key);
            }
        }
    }
}

impl MemoryState {
    /// Apply every write and check the visibility invariant on touched experts.
    fn apply_all(
        &mut self,
        writes: Vec<Write>,
        now: DateTime<Utc>,
        journal: &mut UndoJournal,
    ) -> StoreResult<()> {
        let mut touched = HashSet::new();
        for write in writes {
            journal.record(self, &write);
            if let Some(expert_id) = self.apply(write, now)? {
                touched.insert(expert_id);
            }
        }

        for expert_id in &touched {
            let expert = self.expert(expert_id)?;
            if !expert.holds_visibility_invariant() {
                return Err(StoreError::InvalidInput(format!(
                    "expert {} would be PRIVATE without owner or expiry",
                    expert_id
                )));
            }
        }
        Ok(())
    }

    fn expert(&self, expert_id: &str) -> StoreResult<&Expert> {
        self.experts
            .get(expert_id)
            .ok_or_else(|| StoreError::NotFound(format!("expert {}", expert_id)))
    }

    fn expert_mut(&mut self, expert_id: &str) -> StoreResult<&mut Expert> {
        self.experts
            .get_mut(expert_id)
            .ok_or_else(|| StoreError::NotFound(format!("expert {}", expert_id)))
    }

    fn ticket_mut(&mut self, ticket_id: &str) -> StoreResult<&mut Ticket> {
        self.tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket_id)))
    }

    fn has_open_ticket(&self, expert_id: &str) -> bool {
        self.tickets
            .iter()
            .any(|t| t.expert_id == expert_id && t.status == TicketStatus::Open)
    }

    fn check(&self, guard: &Guard) -> StoreResult<()> {
        match guard {
            Guard::Visibility {
                expert_id,
                expected,
            } => {
                let expert = self.expert(expert_id)?;
                if expert.visibility_status != *expected {
                    return Err(StoreError::Conflict(format!(
                        "expert {} is {}, expected {}",
                        expert_id, expert.visibility_status, expected
                    )));
                }
            }
            Guard::Owner {
                expert_id,
                expected,
            } => {
                let expert = self.expert(expert_id)?;
                if &expert.owner_id != expected {
                    return Err(StoreError::Conflict(format!(
                        "owner of expert {} changed concurrently",
                        expert_id
                    )));
                }
            }
            Guard::ExpiredBy { expert_id, at } => {
                let expert = self.expert(expert_id)?;
                let expired = expert.is_private()
                    && expert.private_expires_at.is_some_and(|t| t <= *at);
                if !expired {
                    return Err(StoreError::Conflict(format!(
                        "expert {} is no longer expired",
                        expert_id
                    )));
                }
            }
            Guard::AuthorityUnset { expert_id } => {
                if self.expert(expert_id)?.professional_authority_index.is_some() {
                    return Err(StoreError::Conflict(format!(
                        "authority index of expert {} is already set",
                        expert_id
                    )));
                }
            }
            Guard::TicketStatus {
                ticket_id,
                expected,
            } => {
                let ticket = self
                    .tickets
                    .iter()
                    .find(|t| &t.id == ticket_id)
                    .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket_id)))?;
                if ticket.status != *expected {
                    return Err(StoreError::Conflict(format!(
                        "ticket {} is {}, expected {}",
                        ticket_id,
                        ticket.status.as_str(),
                        expected.as_str()
                    )));
                }
            }
            Guard::NoOpenTicket { expert_id } => {
                if self.has_open_ticket(expert_id) {
                    return Err(StoreError::Conflict(format!(
                        "expert {} already has an open ticket",
                        expert_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: Write, now: DateTime<Utc>) -> StoreResult<Option<String>> {
        match write {
            Write::InsertUser(user) => {
                if self.users.contains_key(&user.id) {
                    return Err(StoreError::Conflict(format!("user {} exists", user.id)));
                }
                self.users.insert(user.id.clone(), user);
                Ok(None)
            }
            Write::InsertExpert(expert) => {
                if self.experts.contains_key(&expert.id) {
                    return Err(StoreError::Conflict(format!("expert {} exists", expert.id)));
                }
                let id = expert.id.clone();
                self.experts.insert(id.clone(), *expert);
                Ok(Some(id))
            }
            Write::ReleaseToPool { expert_id, at } => {
                let expert = self.expert_mut(&expert_id)?;
                expert.visibility_status = VisibilityStatus::GlobalPool;
                expert.private_expires_at = Some(at);
                expert.updated_at = now;
                Ok(Some(expert_id))
            }
            Write::ClaimPrivate {
                expert_id,
                owner_id,
                expires_at,
            } => {
                let expert = self.expert_mut(&expert_id)?;
                expert.visibility_status = VisibilityStatus::Private;
                expert.owner_id = Some(owner_id);
                expert.private_expires_at = Some(expires_at);
                expert.updated_at = now;
                Ok(Some(expert_id))
            }
            Write::SetOwner {
                expert_id,
                owner_id,
                expires_at,
            } => {
                let expert = self.expert_mut(&expert_id)?;
                expert.owner_id = Some(owner_id);
                if let Some(expires_at) = expires_at {
                    expert.private_expires_at = Some(expires_at);
                }
                expert.updated_at = now;
                Ok(Some(expert_id))
            }
            Write::InsertTicket(ticket) => {
                self.expert(&ticket.expert_id)?;
                if ticket.status == TicketStatus::Open && self.has_open_ticket(&ticket.expert_id) {
                    return Err(StoreError::Conflict(format!(
                        "expert {} already has an open ticket",
                        ticket.expert_id
                    )));
                }
                self.tickets.push(ticket);
                Ok(None)
            }
            Write::SetTicketStatus {
                ticket_id,
                status,
                owner_id,
                at,
            } => {
                let ticket = self.ticket_mut(&ticket_id)?;
                ticket.status = status;
                if owner_id.is_some() {
                    ticket.owner_id = owner_id;
                }
                ticket.updated_at = at;
                Ok(None)
            }
            Write::SetUserRole { user_id, role } => {
                let user = self
                    .users
                    .get_mut(&user_id)
                    .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
                user.role = role;
                Ok(None)
            }
            Write::SetAuthority {
                expert_id,
                citation_count,
                patent_count,
                index,
            } => {
                let expert = self.expert_mut(&expert_id)?;
                expert.citation_count = Some(citation_count);
                expert.patent_count = Some(patent_count);
                expert.professional_authority_index = Some(index);
                expert.updated_at = now;
                Ok(None)
            }
            Write::SetContactCloak { expert_id, cloaked } => {
                let expert = self.expert_mut(&expert_id)?;
                expert.contact_cloaked = cloaked;
                expert.updated_at = now;
                Ok(None)
            }
            Write::InsertContactAttempt(attempt) => {
                self.expert(&attempt.expert_id)?;
                self.contact_attempts.push(attempt);
                Ok(None)
            }
            Write::InsertEngagement(engagement) => {
                self.expert(&engagement.expert_id)?;
                self.engagements.push(engagement);
                Ok(None)
            }
            Write::RecomputeEngagementAggregates { expert_id } => {
                let history: Vec<Engagement> = self
                    .engagements
                    .iter()
                    .filter(|e| e.expert_id == expert_id)
                    .cloned()
                    .collect();
                let expert = self.expert_mut(&expert_id)?;
                expert.aggregates = aggregate_engagements(&history);
                expert.updated_at = now;
                Ok(None)
            }
            Write::RecomputeReputation { expert_id } => {
                let statuses: Vec<TicketStatus> = self
                    .tickets
                    .iter()
                    .filter(|t| t.expert_id == expert_id)
                    .map(|t| t.status)
                    .collect();
                let expert = self.expert_mut(&expert_id)?;
                let breakdown = score_expert(expert, statuses);
                expert.reputation_score = breakdown.score;
                expert.updated_at = now;
                Ok(None)
            }
            Write::UpsertConfig { key, value } => {
                self.config.insert(key, value);
                Ok(None)
            }
            Write::InsertDemandSignal(signal) => {
                self.demand_signals.push(signal);
                Ok(None)
            }
            Write::SetDemandStatus { signal_id, status } => {
                let signal = self
                    .demand_signals
                    .iter_mut()
                    .find(|s| s.id == signal_id)
                    .ok_or_else(|| StoreError::NotFound(format!("demand signal {}", signal_id)))?;
                signal.status = status;
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored audit rows.
    pub async fn audit_len(&self) -> usize {
        self.state.read().await.audit.len()
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.state.read().await.tickets.clone()
    }
}

#[async_trait]
impl GovernanceStore for InMemoryStore {
    async fn get_expert(&self, expert_id: &str) -> StoreResult<Option<Expert>> {
        Ok(self.state.read().await.experts.get(expert_id).cloned())
    }

    async fn get_experts(&self, expert_ids: &[String]) -> StoreResult<Vec<Expert>> {
        let state = self.state.read().await;
        Ok(expert_ids
            .iter()
            .filter_map(|id| state.experts.get(id).cloned())
            .collect())
    }

    async fn count_private_expiring(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let state = self.state.read().await;
        let count = state
            .experts
            .values()
            .filter(|e| e.is_private())
            .filter_map(|e| e.private_expires_at)
            .filter(|t| after.is_none_or(|a| *t > a) && *t <= until)
            .count();
        Ok(count as u64)
    }

    async fn list_private_by_expiry(&self, limit: usize) -> StoreResult<Vec<ExpiringExpert>> {
        let state = self.state.read().await;
        let mut rows: Vec<ExpiringExpert> = state
            .experts
            .values()
            .filter(|e| e.is_private())
            .filter_map(|e| {
                e.private_expires_at.map(|expires| ExpiringExpert {
                    id: e.id.clone(),
                    name: e.profile.name.clone(),
                    owner_id: e.owner_id.clone(),
                    private_expires_at: expires,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.private_expires_at
                .cmp(&b.private_expires_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn find_expired_private(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Expert>> {
        let state = self.state.read().await;
        let mut rows: Vec<Expert> = state
            .experts
            .values()
            .filter(|e| e.is_private() && !e.has_verified_contact())
            .filter(|e| e.private_expires_at.is_some_and(|t| t <= now))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.private_expires_at.cmp(&b.private_expires_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn get_ticket(&self, ticket_id: &str) -> StoreResult<Option<Ticket>> {
        let state = self.state.read().await;
        Ok(state.tickets.iter().find(|t| t.id == ticket_id).cloned())
    }

    async fn tickets_for_expert(&self, expert_id: &str) -> StoreResult<Vec<Ticket>> {
        let state = self.state.read().await;
        Ok(state
            .tickets
            .iter()
            .filter(|t| t.expert_id == expert_id)
            .cloned()
            .collect())
    }

    async fn open_tickets(&self, limit: usize) -> StoreResult<Vec<Ticket>> {
        let state = self.state.read().await;
        Ok(state
            .tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Open)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_contact_attempts(
        &self,
        expert_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .contact_attempts
            .iter()
            .filter(|a| a.expert_id == expert_id && a.created_at >= since)
            .count() as u64)
    }

    async fn count_engagements(&self, expert_id: &str, since: DateTime<Utc>) -> StoreResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .engagements
            .iter()
            .filter(|e| e.expert_id == expert_id && e.date >= since)
            .count() as u64)
    }

    async fn experts_contacted_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        let ids: BTreeSet<String> = state
            .contact_attempts
            .iter()
            .filter(|a| a.created_at >= since)
            .map(|a| a.expert_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn engagements_for_expert(&self, expert_id: &str) -> StoreResult<Vec<Engagement>> {
        let state = self.state.read().await;
        Ok(state
            .engagements
            .iter()
            .filter(|e| e.expert_id == expert_id)
            .cloned()
            .collect())
    }

    async fn pool_supply(&self) -> StoreResult<Vec<SupplyProfile>> {
        let state = self.state.read().await;
        Ok(state
            .experts
            .values()
            .filter(|e| e.visibility_status == VisibilityStatus::GlobalPool)
            .map(|e| SupplyProfile {
                expert_id: e.id.clone(),
                industry: e.profile.industry.clone(),
                sub_industry: e.profile.sub_industry.clone(),
                region: e.profile.region.clone(),
            })
            .collect())
    }

    async fn active_demand_signals(&self) -> StoreResult<Vec<DemandSignal>> {
        let state = self.state.read().await;
        let mut signals: Vec<DemandSignal> = state
            .demand_signals
            .iter()
            .filter(|s| s.status.is_active())
            .cloned()
            .collect();
        signals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(signals)
    }

    async fn get_demand_signal(&self, signal_id: &str) -> StoreResult<Option<DemandSignal>> {
        let state = self.state.read().await;
        Ok(state
            .demand_signals
            .iter()
            .find(|s| s.id == signal_id)
            .cloned())
    }

    async fn get_config(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.state.read().await.config.get(key).cloned())
    }

    async fn query_audit(&self, query: &AuditQuery, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        let state = self.state.read().await;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt> {
        let mut state = self.state.write().await;

        for guard in &batch.guards {
            state.check(guard)?;
        }

        let now = Utc::now();
        let mut journal = UndoJournal::begin(&state);
        if let Err(err) = state.apply_all(batch.writes, now, &mut journal) {
            journal.rollback(&mut state);
            return Err(err);
        }

        let entries: Vec<AuditEntry> = batch
            .audit
            .into_iter()
            .map(|append| append.stamp(new_id(), now))
            .collect();
        state.audit.extend(entries.iter().cloned());

        debug!(audit_rows = entries.len(), "Committed write batch");

        Ok(CommitReceipt { audit: entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAppend, AuditMetadata};
    use crate::model::{ExpertProfile, Role};
    use chrono::Duration;

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            name: id.into(),
            email: format!("{}@example.com", id),
            role: Role::Csa,
        }
    }

    fn private_expert(id: &str, owner: &str, expires_in: Duration) -> Expert {
        let now = Utc::now();
        Expert::new_private(
            id.into(),
            ExpertProfile {
                name: id.into(),
                ..Default::default()
            },
            owner.into(),
            now + expires_in,
            now,
        )
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .commit(
                WriteBatch::new()
                    .write(Write::InsertUser(user("u1")))
                    .write(Write::InsertExpert(Box::new(private_expert(
                        "e1",
                        "u1",
                        Duration::days(3),
                    )))),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_failed_guard_applies_nothing() {
        let store = seeded().await;

        let batch = WriteBatch::new()
            .guard(Guard::Visibility {
                expert_id: "e1".into(),
                expected: VisibilityStatus::GlobalPool,
            })
            .write(Write::SetContactCloak {
                expert_id: "e1".into(),
                cloaked: true,
            })
            .audit(AuditAppend::new(AuditMetadata::profile_edit(
                "contact_cloaked",
                Value::Bool(true),
            )));

        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let expert = store.get_expert("e1").await.unwrap().unwrap();
        assert!(!expert.contact_cloaked);
        assert_eq!(store.audit_len().await, 0);
    }

    #[tokio::test]
    async fn test_failing_write_rolls_back_earlier_writes() {
        let store = seeded().await;

        let batch = WriteBatch::new()
            .write(Write::SetContactCloak {
                expert_id: "e1".into(),
                cloaked: true,
            })
            .write(Write::SetUserRole {
                user_id: "missing".into(),
                role: Role::Admin,
            });

        assert!(matches!(
            store.commit(batch).await,
            Err(StoreError::NotFound(_))
        ));
        let expert = store.get_expert("e1").await.unwrap().unwrap();
        assert!(!expert.contact_cloaked);
    }

    #[tokio::test]
    async fn test_rollback_restores_appends_and_in_place_updates() {
        let store = seeded().await;
        let now = Utc::now();
        store
            .commit(WriteBatch::new().write(Write::InsertTicket(Ticket::open(
                "t1".into(),
                "e1".into(),
                "u2".into(),
                Some("u1".into()),
                now,
            ))))
            .await
            .unwrap();

        let batch = WriteBatch::new()
            .write(Write::SetTicketStatus {
                ticket_id: "t1".into(),
                status: TicketStatus::Approved,
                owner_id: Some("u2".into()),
                at: now,
            })
            .write(Write::InsertExpert(Box::new(private_expert(
                "e2",
                "u1",
                Duration::days(1),
            ))))
            .write(Write::UpsertConfig {
                key: "expiry_days".into(),
                value: Value::from(10),
            })
            // e1 goes through the pool and back under a new expiry
            .write(Write::ReleaseToPool {
                expert_id: "e1".into(),
                at: now,
            })
            .write(Write::ClaimPrivate {
                expert_id: "e1".into(),
                owner_id: "u1".into(),
                expires_at: now,
            })
            // Fails last, after every other write has landed
            .write(Write::SetOwner {
                expert_id: "missing".into(),
                owner_id: "u1".into(),
                expires_at: None,
            });

        assert!(matches!(
            store.commit(batch).await,
            Err(StoreError::NotFound(_))
        ));

        let tickets = store.tickets().await;
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].status, TicketStatus::Open);
        assert_eq!(tickets[0].owner_id.as_deref(), Some("u1"));
        assert!(store.get_expert("e2").await.unwrap().is_none());
        assert!(store.get_config("expiry_days").await.unwrap().is_none());
        let e1 = store.get_expert("e1").await.unwrap().unwrap();
        assert!(e1.is_private());
        assert!(e1.private_expires_at.unwrap() > now);
        assert_eq!(store.audit_len().await, 0);
    }

    #[tokio::test]
    async fn test_invariant_violation_rolls_back() {
        let store = seeded().await;
        let mut ownerless = private_expert("e2", "u1", Duration::days(1));
        ownerless.owner_id = None;

        let batch = WriteBatch::new()
            .write(Write::SetContactCloak {
                expert_id: "e1".into(),
                cloaked: true,
            })
            .write(Write::InsertExpert(Box::new(ownerless)));

        assert!(matches!(
            store.commit(batch).await,
            Err(StoreError::InvalidInput(_))
        ));
        assert!(store.get_expert("e2").await.unwrap().is_none());
        assert!(!store.get_expert("e1").await.unwrap().unwrap().contact_cloaked);
    }

    #[tokio::test]
    async fn test_second_open_ticket_is_rejected() {
        let store = seeded().await;
        let now = Utc::now();
        let open = |id: &str| {
            Write::InsertTicket(Ticket::open(
                id.into(),
                "e1".into(),
                "u2".into(),
                Some("u1".into()),
                now,
            ))
        };

        store.commit(WriteBatch::new().write(open("t1"))).await.unwrap();
        assert!(matches!(
            store.commit(WriteBatch::new().write(open("t2"))).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_expiry_counts_use_half_open_windows() {
        let store = seeded().await;
        let now = Utc::now();

        assert_eq!(
            store
                .count_private_expiring(None, now + Duration::days(1))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .count_private_expiring(Some(now + Duration::days(1)), now + Duration::days(7))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_audit_reads_newest_first() {
        let store = seeded().await;
        for field in ["a", "b", "c"] {
            store
                .commit(WriteBatch::new().audit(AuditAppend::new(AuditMetadata::profile_edit(
                    field,
                    Value::Null,
                ))))
                .await
                .unwrap();
        }

        let rows = store.query_audit(&AuditQuery::default(), 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        match &rows[0].metadata {
            AuditMetadata::ProfileEdit { field, .. } => assert_eq!(field, "c"),
            other => panic!("unexpected metadata {:?}", other),
        }
    }
}
