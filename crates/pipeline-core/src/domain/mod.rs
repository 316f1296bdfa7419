//! Domain Layer
//!
//! Stages, opportunities, health classification and audit records.
//! No I/O lives here.

mod activity;
mod health;
mod opportunity;
mod stage;

pub use activity::{stage_change_subject, ActivityRecord};
pub use health::{classify, classify_opportunity, sort_by_urgency, StageHealth};
pub use opportunity::{
    CloseReason, ContactId, LossReason, Opportunity, OpportunityId, OpportunityStatus,
    OrganizationId, Priority, ProductId, WinReason,
};
pub use stage::{Stage, StageInfo, StageParseError, StageRegistry};
