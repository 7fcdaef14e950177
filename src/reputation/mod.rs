//! Reputation and Knowledge Loop
//!
//! Scores experts from their ticket history, profile completeness and pool
//! status, and keeps engagement aggregates current as bookings are logged.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────────┐     ┌─────────────────┐
//! │ NewEngagement   │────►│ ReputationManager │◄────│ AuthorityIndex  │
//! │ (knowledge loop)│     │ (orchestrator)    │     │ (write-once)    │
//! └─────────────────┘     └───────────────────┘     └─────────────────┘
//!                                  │
//!                                  ▼
//!                         ┌───────────────────┐
//!                         │ one WriteBatch:   │
//!                         │ insert engagement │
//!                         │ → aggregates      │
//!                         │ → reputation      │
//!                         └───────────────────┘
//! ```
//!
//! ## Score Model
//!
//! - Pure functions in `score` and `aggregates`; the store evaluates them
//!   inside the commit so derived fields never lag the rows they come from
//! - Cached breakdowns are dropped on every write that can move the score

mod aggregates;
mod authority;
mod manager;
mod score;

pub use aggregates::{aggregate_engagements, ENGAGED_RELIABILITY};
pub use authority::{authority_index, AuthorityUpdate};
pub use manager::{EngagementOutcome, ReputationManager};
pub use score::{
    profile_completeness, round2, score_expert, ticket_satisfaction, ReputationBreakdown,
    COMPLETENESS_WEIGHT, POOL_WEIGHT, POOLED_FACTOR, RESPONSIVENESS_WEIGHT, SATISFACTION_WEIGHT,
};
