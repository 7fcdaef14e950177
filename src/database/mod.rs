//! Governance Persistence
//!
//! A single [`GovernanceStore`] seam with two backends: an in-process store
//! for tests and single-node runs, and PostgreSQL for production. Both apply
//! guarded [`WriteBatch`]es atomically.

mod batch;
mod memory;
pub mod pool;
mod postgres;
mod store;

pub use batch::{CommitReceipt, Guard, Write, WriteBatch};
pub use memory::InMemoryStore;
pub use pool::DatabasePool;
pub use postgres::PgGovernanceStore;
pub use store::{ExpiringExpert, GovernanceStore, StoreError, StoreResult};
