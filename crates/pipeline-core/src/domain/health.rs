//! Stage Health
//!
//! Classifies how urgently an opportunity needs attention, and orders
//! columns so the most urgent cards sit on top.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::opportunity::Opportunity;
use super::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageHealth {
    Closed,
    Expired,
    Rotting,
    Warning,
    Healthy,
}

impl StageHealth {
    /// Sort key within a column: lower shows first
    pub fn sort_priority(&self) -> u8 {
        match self {
            StageHealth::Expired => 0,
            StageHealth::Rotting => 1,
            StageHealth::Warning => 2,
            StageHealth::Healthy => 3,
            StageHealth::Closed => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageHealth::Closed => "closed",
            StageHealth::Expired => "expired",
            StageHealth::Rotting => "rotting",
            StageHealth::Warning => "warning",
            StageHealth::Healthy => "healthy",
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, StageHealth::Expired | StageHealth::Rotting)
    }
}

/// Classify a stage/age/close-date triple.
///
/// First match wins: closed, expired, rotting, warning, healthy.
/// `today` is passed in so the result depends on nothing but the arguments.
pub fn classify(
    stage: Stage,
    days_in_stage: u32,
    expected_close_date: Option<NaiveDate>,
    today: NaiveDate,
) -> StageHealth {
    if stage.is_terminal() {
        return StageHealth::Closed;
    }

    if matches!(expected_close_date, Some(date) if date < today) {
        return StageHealth::Expired;
    }

    let Some(threshold) = stage.rotting_threshold() else {
        return StageHealth::Healthy;
    };

    if days_in_stage > threshold {
        return StageHealth::Rotting;
    }

    if days_in_stage > threshold * 3 / 4 {
        return StageHealth::Warning;
    }

    StageHealth::Healthy
}

/// Classify an opportunity using its own fields
pub fn classify_opportunity(opp: &Opportunity, today: NaiveDate) -> StageHealth {
    classify(opp.stage, opp.days_in_stage, opp.estimated_close_date, today)
}

/// Sort a column by urgency, then by days in stage (oldest first).
/// Stable, so equal cards keep their server order.
pub fn sort_by_urgency(column: &mut [Opportunity], today: NaiveDate) {
    column.sort_by(|a, b| {
        let pa = classify_opportunity(a, today).sort_priority();
        let pb = classify_opportunity(b, today).sort_priority();
        pa.cmp(&pb).then(b.days_in_stage.cmp(&a.days_in_stage))
    });
}
