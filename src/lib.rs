//! Expert Governance Engine
//!
//! Ownership and visibility governance for expert records: who privately
//! holds an expert, when that hold decays back to the shared pool, how
//! ownership moves between users, and how reputation and liquidity are
//! scored around it.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── engine.rs      - Service assembly
//! ├── error.rs       - Error taxonomy
//! ├── model/         - Experts, tickets, users, activity, demand, settings
//! ├── audit/         - Append-only audit log
//! ├── governance/    - Visibility state machine and the rules built on it
//! │   ├── visibility.rs - Guarded transitions
//! │   ├── tickets.rs    - Ownership transfer workflow
//! │   ├── decay.rs      - Expiry forecast, force-expire, sweep
//! │   ├── no_spam.rs    - Outreach-without-booking demotion
//! │   ├── operations.rs - Registration, roles, bulk reclaim
//! │   └── settings.rs   - Runtime settings
//! ├── reputation/    - Scoring, engagement aggregates, authority index
//! ├── liquidity/     - Supply/demand gaps and replenishment
//! ├── collab/        - ML and workflow collaborators, HMAC signing
//! ├── api/           - HTTP API endpoints and middleware
//! └── database/      - Store trait, in-memory and PostgreSQL backends
//! ```

pub mod api;
pub mod audit;
pub mod collab;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod governance;
pub mod liquidity;
pub mod model;
pub mod reputation;

pub use config::{GovernanceConfig, GovernanceTunables};
pub use engine::GovernanceEngine;
pub use error::{GovernanceError, GovernanceResult};

pub use api::{AppState, create_router};
pub use audit::{AuditAction, AuditEntry, AuditLog, AuditMetadata, AuditQuery};
pub use database::{DatabasePool, GovernanceStore, InMemoryStore, PgGovernanceStore, StoreError};
pub use model::{Caller, Expert, ExpertProfile, Role, Ticket, TicketStatus, User, VisibilityStatus};
