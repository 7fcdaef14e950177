//! Ticket-based ownership transfer.
//!
//! A ticket is opened by a requester against an expert, and decided exactly
//! once. Administrative reassignment always leaves a RESOLVED ticket behind,
//! either by resolving the open one or by recording an override.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::audit::{AuditAppend, AuditMetadata};
use crate::database::{GovernanceStore, Guard, Write, WriteBatch};
use crate::error::{GovernanceError, GovernanceResult};
use crate::governance::settings::SettingsService;
use crate::governance::visibility::{self, Transition, VisibilityStateMachine};
use crate::model::{new_id, Caller, Expert, Ticket, TicketStatus, VisibilityStatus};

pub const OPEN_TICKETS_LIMIT: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenTicketRequest {
    pub expert_id: String,
    /// Defaults to the expert's current owner; only admins may name another
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReassignOutcome {
    pub expert_id: String,
    pub previous_owner_id: Option<String>,
    pub new_owner_id: String,
    pub ticket_id: String,
}

#[derive(Clone)]
pub struct TicketWorkflow {
    store: Arc<dyn GovernanceStore>,
    machine: VisibilityStateMachine,
    settings: SettingsService,
}

impl TicketWorkflow {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        machine: VisibilityStateMachine,
        settings: SettingsService,
    ) -> Self {
        Self {
            store,
            machine,
            settings,
        }
    }

    async fn load_expert(&self, expert_id: &str) -> GovernanceResult<Expert> {
        self.store
            .get_expert(expert_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("expert {}", expert_id)))
    }

    async fn load_ticket(&self, ticket_id: &str) -> GovernanceResult<Ticket> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| GovernanceError::not_found(format!("ticket {}", ticket_id)))
    }

    pub async fn open(&self, caller: &Caller, request: OpenTicketRequest) -> GovernanceResult<Ticket> {
        let expert = self.load_expert(&request.expert_id).await?;
        if expert.is_owned_by(&caller.user_id) && expert.is_private() {
            return Err(GovernanceError::validation(
                "requester already owns this expert",
            ));
        }

        let owner_id = match request.owner_id {
            Some(named) if expert.owner_id.as_deref() != Some(named.as_str()) => {
                if !caller.is_admin() {
                    return Err(GovernanceError::forbidden(
                        "only an admin may name a ticket owner other than the expert's owner",
                    ));
                }
                Some(named)
            }
            _ => expert.owner_id.clone(),
        };

        let ticket = Ticket::open(
            new_id(),
            expert.id.clone(),
            caller.user_id.clone(),
            owner_id,
            Utc::now(),
        );
        let batch = WriteBatch::new()
            .guard(Guard::NoOpenTicket {
                expert_id: expert.id.clone(),
            })
            .write(Write::InsertTicket(ticket.clone()));
        self.store.commit(batch).await?;

        info!(
            ticket_id = %ticket.id,
            expert_id = %ticket.expert_id,
            requester_id = %ticket.requester_id,
            "Opened transfer ticket"
        );
        Ok(ticket)
    }

    fn ensure_can_decide(caller: &Caller, ticket: &Ticket) -> GovernanceResult<()> {
        if caller.is_admin() || ticket.owner_id.as_deref() == Some(caller.user_id.as_str()) {
            Ok(())
        } else {
            Err(GovernanceError::forbidden(
                "only the ticket owner or an admin may decide a ticket",
            ))
        }
    }

    fn ensure_open(ticket: &Ticket) -> GovernanceResult<()> {
        if ticket.status.is_terminal() {
            return Err(GovernanceError::conflict(format!(
                "ticket {} is already {}",
                ticket.id,
                ticket.status.as_str()
            )));
        }
        Ok(())
    }

    /// Transfer the expert to the requester with a fresh expiry.
    pub async fn approve(&self, caller: &Caller, ticket_id: &str) -> GovernanceResult<Ticket> {
        let ticket = self.load_ticket(ticket_id).await?;
        Self::ensure_open(&ticket)?;
        Self::ensure_can_decide(caller, &ticket)?;

        let expert = self.load_expert(&ticket.expert_id).await?;
        // A stale ticket owner cannot hand over an expert they no longer hold
        if !caller.is_admin() && !(expert.is_private() && expert.is_owned_by(&caller.user_id)) {
            return Err(GovernanceError::forbidden(
                "only the expert's current owner or an admin may approve a transfer",
            ));
        }

        let now = Utc::now();
        let expires_at = now + Duration::days(i64::from(self.settings.expiry_days().await?));
        let new_owner = ticket.requester_id.clone();

        let mut batch = match expert.visibility_status {
            VisibilityStatus::GlobalPool => visibility::plan(
                &expert,
                Transition::Claim {
                    owner_id: new_owner.clone(),
                    expires_at,
                },
            )?,
            VisibilityStatus::Private => WriteBatch::new()
                .guard(Guard::Owner {
                    expert_id: expert.id.clone(),
                    expected: expert.owner_id.clone(),
                })
                .write(Write::SetOwner {
                    expert_id: expert.id.clone(),
                    owner_id: new_owner.clone(),
                    expires_at: Some(expires_at),
                }),
        };
        batch.push_guard(Guard::TicketStatus {
            ticket_id: ticket.id.clone(),
            expected: TicketStatus::Open,
        });
        batch.push_write(Write::SetTicketStatus {
            ticket_id: ticket.id.clone(),
            status: TicketStatus::Approved,
            owner_id: Some(new_owner.clone()),
            at: now,
        });
        let batch = batch.audit(
            AuditAppend::new(AuditMetadata::OwnershipChange {
                previous_owner_id: expert.owner_id.clone(),
                new_owner_id: new_owner.clone(),
                ticket_id: ticket.id.clone(),
                resolved_by_admin: false,
            })
            .by(caller.user_id.clone())
            .on(expert.id.clone()),
        );
        self.machine.apply(batch).await?;

        self.load_ticket(ticket_id).await
    }

    pub async fn reject(&self, caller: &Caller, ticket_id: &str) -> GovernanceResult<Ticket> {
        let ticket = self.load_ticket(ticket_id).await?;
        Self::ensure_open(&ticket)?;
        Self::ensure_can_decide(caller, &ticket)?;

        let batch = WriteBatch::new()
            .guard(Guard::TicketStatus {
                ticket_id: ticket.id.clone(),
                expected: TicketStatus::Open,
            })
            .write(Write::SetTicketStatus {
                ticket_id: ticket.id.clone(),
                status: TicketStatus::Rejected,
                owner_id: None,
                at: Utc::now(),
            })
            .audit(
                AuditAppend::new(AuditMetadata::TicketDecision {
                    ticket_id: ticket.id.clone(),
                    decision: TicketStatus::Rejected,
                })
                .by(caller.user_id.clone())
                .on(ticket.expert_id.clone()),
            );
        self.machine.apply(batch).await?;

        self.load_ticket(ticket_id).await
    }

    pub async fn list_open(&self, caller: &Caller) -> GovernanceResult<Vec<Ticket>> {
        caller.require_admin()?;
        Ok(self.store.open_tickets(OPEN_TICKETS_LIMIT).await?)
    }

    /// Administrative ownership override.
    ///
    /// Ownership update, ticket resolution and the OWNERSHIP_CHANGE row commit
    /// as one batch.
    pub async fn reassign_owner(
        &self,
        caller: &Caller,
        expert_id: &str,
        new_owner_id: &str,
    ) -> GovernanceResult<ReassignOutcome> {
        caller.require_admin()?;
        let expert = self.load_expert(expert_id).await?;
        if self.store.get_user(new_owner_id).await?.is_none() {
            return Err(GovernanceError::not_found(format!("user {}", new_owner_id)));
        }

        let now = Utc::now();
        let open_ticket = self
            .store
            .tickets_for_expert(expert_id)
            .await?
            .into_iter()
            .find(|t| t.status == TicketStatus::Open);

        let mut batch = WriteBatch::new()
            .guard(Guard::Owner {
                expert_id: expert.id.clone(),
                expected: expert.owner_id.clone(),
            })
            .write(Write::SetOwner {
                expert_id: expert.id.clone(),
                owner_id: new_owner_id.to_string(),
                expires_at: None,
            });

        let ticket_id = match open_ticket {
            Some(ticket) => {
                batch.push_guard(Guard::TicketStatus {
                    ticket_id: ticket.id.clone(),
                    expected: TicketStatus::Open,
                });
                batch.push_write(Write::SetTicketStatus {
                    ticket_id: ticket.id.clone(),
                    status: TicketStatus::Resolved,
                    owner_id: Some(new_owner_id.to_string()),
                    at: now,
                });
                ticket.id
            }
            None => {
                let ticket = Ticket::resolved_override(
                    new_id(),
                    expert.id.clone(),
                    caller.user_id.clone(),
                    new_owner_id.to_string(),
                    now,
                );
                let id = ticket.id.clone();
                batch.push_guard(Guard::NoOpenTicket {
                    expert_id: expert.id.clone(),
                });
                batch.push_write(Write::InsertTicket(ticket));
                id
            }
        };

        let batch = batch.audit(
            AuditAppend::new(AuditMetadata::OwnershipChange {
                previous_owner_id: expert.owner_id.clone(),
                new_owner_id: new_owner_id.to_string(),
                ticket_id: ticket_id.clone(),
                resolved_by_admin: true,
            })
            .by(caller.user_id.clone())
            .on(expert.id.clone()),
        );
        self.machine.apply(batch).await?;

        Ok(ReassignOutcome {
            expert_id: expert.id,
            previous_owner_id: expert.owner_id,
            new_owner_id: new_owner_id.to_string(),
            ticket_id,
        })
    }
}
