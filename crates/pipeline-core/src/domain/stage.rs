//! Pipeline Stages
//!
//! Ordered, immutable catalogue of the stages shown as board columns.
//! Terminal stages (won/lost) carry no rotting threshold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A pipeline stage. Declaration order is board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NewLead,
    InitialOutreach,
    SampleVisitOffered,
    FeedbackLogged,
    DemoScheduled,
    ClosedWon,
    ClosedLost,
}

/// Static metadata for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageInfo {
    pub stage: Stage,
    pub id: &'static str,
    pub label: &'static str,
    /// Days before an opportunity is considered stuck; `None` for terminal stages
    pub rotting_threshold_days: Option<u32>,
    pub description: &'static str,
}

const STAGES: [StageInfo; 7] = [
    StageInfo {
        stage: Stage::NewLead,
        id: "new_lead",
        label: "New Lead",
        rotting_threshold_days: Some(7),
        description: "New prospect identified. Research the operator and prepare the pitch.",
    },
    StageInfo {
        stage: Stage::InitialOutreach,
        id: "initial_outreach",
        label: "Initial Outreach",
        rotting_threshold_days: Some(10),
        description: "First contact made. Qualify interest and schedule a follow-up.",
    },
    StageInfo {
        stage: Stage::SampleVisitOffered,
        id: "sample_visit_offered",
        label: "Sample/Visit Offered",
        rotting_threshold_days: Some(14),
        description: "Sample sent or site visit scheduled. Follow up within 3-5 days.",
    },
    StageInfo {
        stage: Stage::FeedbackLogged,
        id: "feedback_logged",
        label: "Feedback Logged",
        rotting_threshold_days: Some(7),
        description: "Operator feedback recorded. Decide whether a demo is warranted.",
    },
    StageInfo {
        stage: Stage::DemoScheduled,
        id: "demo_scheduled",
        label: "Demo Scheduled",
        rotting_threshold_days: Some(5),
        description: "Final demonstration scheduled. Prepare pricing and terms for close.",
    },
    StageInfo {
        stage: Stage::ClosedWon,
        id: "closed_won",
        label: "Closed - Won",
        rotting_threshold_days: None,
        description: "Deal won. Hand off to account management.",
    },
    StageInfo {
        stage: Stage::ClosedLost,
        id: "closed_lost",
        label: "Closed - Lost",
        rotting_threshold_days: None,
        description: "Opportunity lost. Review the loss reason before re-engaging.",
    },
];

/// Error for stage identifiers that are not columns on the board
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pipeline stage \"{0}\"")]
pub struct StageParseError(pub String);

impl Stage {
    /// All stages in board order
    pub const ALL: [Stage; 7] = [
        Stage::NewLead,
        Stage::InitialOutreach,
        Stage::SampleVisitOffered,
        Stage::FeedbackLogged,
        Stage::DemoScheduled,
        Stage::ClosedWon,
        Stage::ClosedLost,
    ];

    pub fn info(&self) -> &'static StageInfo {
        &STAGES[self.ordinal()]
    }

    pub fn as_str(&self) -> &'static str {
        self.info().id
    }

    pub fn label(&self) -> &'static str {
        self.info().label
    }

    /// Position on the board, used for tie-break sorting
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    pub fn rotting_threshold(&self) -> Option<u32> {
        self.info().rotting_threshold_days
    }

    /// 75% of the rotting threshold, floored
    pub fn warning_threshold(&self) -> Option<u32> {
        self.rotting_threshold().map(|days| days * 3 / 4)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }

    pub fn parse(s: &str) -> Option<Stage> {
        STAGES.iter().find(|info| info.id == s).map(|info| info.stage)
    }

    /// True when `id` names a board column rather than a card
    pub fn is_stage_id(id: &str) -> bool {
        Stage::parse(id).is_some()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::parse(s).ok_or_else(|| StageParseError(s.to_string()))
    }
}

/// Read-only view over the stage catalogue
pub struct StageRegistry;

impl StageRegistry {
    pub fn stages() -> &'static [StageInfo] {
        &STAGES
    }

    pub fn ids() -> Vec<&'static str> {
        STAGES.iter().map(|info| info.id).collect()
    }

    pub fn active_stages() -> Vec<Stage> {
        Stage::ALL.into_iter().filter(|s| !s.is_terminal()).collect()
    }

    pub fn closed_stages() -> Vec<Stage> {
        Stage::ALL.into_iter().filter(|s| s.is_terminal()).collect()
    }

    /// Stages shown when a fresh stage filter is applied (closed stages hidden)
    pub fn default_filter_stages() -> Vec<Stage> {
        Self::active_stages()
    }

    /// Comma-separated list used in error messages
    pub fn describe() -> String {
        Self::ids().join(", ")
    }
}
