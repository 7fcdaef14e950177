//! Ownership & Visibility Governance
//!
//! ```text
//!  ┌──────────────────────┐  ┌───────────────┐  ┌───────────────┐
//!  │ GovernanceOperations │  │ TicketWorkflow│  │ DecayScheduler│
//!  │ bulk-reclaim, roles  │  │ open/decide/  │  │ forecast,     │
//!  │ registration         │  │ reassign      │  │ force, sweep  │
//!  └──────────┬───────────┘  └───────┬───────┘  └───────┬───────┘
//!             │                      │                  │
//!             ▼                      ▼                  ▼
//!  ┌────────────────────────────────────────────────────────────┐
//!  │ VisibilityStateMachine: guarded batch + one audit row      │◄── NoSpamAuditor
//!  └────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                    GovernanceStore::commit
//! ```

pub mod decay;
pub mod no_spam;
pub mod operations;
pub mod settings;
pub mod tickets;
pub mod visibility;

pub use decay::{DecayForecast, DecayScheduler, ExpiryBuckets, ExpirySweepReport, ForceExpireOutcome};
pub use no_spam::{
    should_demote, ContactAttemptOutcome, Demotion, NoSpamAuditor, NoSpamPolicy,
    NoSpamSweepReport, WindowCounts,
};
pub use operations::{BulkReclaimOutcome, BulkReclaimRequest, GovernanceOperations};
pub use settings::SettingsService;
pub use tickets::{OpenTicketRequest, ReassignOutcome, TicketWorkflow};
pub use visibility::{Transition, VisibilityStateMachine};
