//! Audit Log
//!
//! Append-only history of every governance mutation. Each committed write
//! batch carries its audit rows, so a mutation and its history land together
//! or not at all.

mod entry;
mod log;

pub use entry::{
    AuditAction, AuditAppend, AuditEntry, AuditMetadata, AuditQuery, AuditSeverity,
    DEFAULT_AUDIT_LIMIT, MAX_AUDIT_LIMIT,
};
pub use log::AuditLog;
