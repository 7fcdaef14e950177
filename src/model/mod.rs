//! Domain records shared by the governance engine, the store and the API.

mod activity;
mod demand;
mod expert;
pub mod settings;
mod ticket;
mod user;

pub use activity::{ContactAttempt, Engagement, NewEngagement};
pub use demand::{DemandSignal, DemandStatus, SegmentCriteria, SupplyProfile};
pub use expert::{
    Contact, ContactType, EngagementAggregates, Expert, ExpertProfile, MnpiRiskLevel,
    VisibilityStatus,
};
pub use settings::SystemSettings;
pub use ticket::{Ticket, TicketStatus};
pub use user::{Caller, Role, User};

/// Fresh opaque identifier for new records.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
