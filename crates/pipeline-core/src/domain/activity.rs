//! Activity Records
//!
//! Audit-log entry written after a stage change has been persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::opportunity::{OpportunityId, OrganizationId};
use super::stage::Stage;

pub const INTERACTION: &str = "interaction";
pub const NOTE: &str = "note";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_type: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub subject: String,
    pub activity_date: DateTime<Utc>,
    pub opportunity_id: OpportunityId,
    pub organization_id: OrganizationId,
}

impl ActivityRecord {
    /// Note describing a move between two stages
    pub fn stage_change(
        opportunity_id: OpportunityId,
        organization_id: OrganizationId,
        from: Stage,
        to: Stage,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            activity_type: INTERACTION.to_string(),
            kind: NOTE.to_string(),
            subject: stage_change_subject(from, to),
            activity_date: at,
            opportunity_id,
            organization_id,
        }
    }
}

pub fn stage_change_subject(from: Stage, to: Stage) -> String {
    format!("Stage changed: {} → {}", from.label(), to.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_change_shape() {
        let at = Utc::now();
        let record = ActivityRecord::stage_change(5, 9, Stage::DemoScheduled, Stage::ClosedWon, at);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["activity_type"], "interaction");
        assert_eq!(json["type"], "note");
        assert_eq!(json["subject"], "Stage changed: Demo Scheduled → Closed - Won");
        assert_eq!(json["opportunity_id"], 5);
        assert_eq!(json["organization_id"], 9);
    }
}
