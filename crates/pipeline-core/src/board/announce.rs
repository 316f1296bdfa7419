//! Screen-reader announcements for drag gestures

use crate::domain::{Opportunity, Stage};

pub fn picked_up(opp: &Opportunity) -> String {
    format!("Picked up {}. Currently in {} stage.", opp.name, opp.stage.label())
}

pub fn moving_over(stage: Option<Stage>) -> String {
    match stage {
        Some(stage) => format!("Moving to {} stage.", stage.label()),
        None => "No longer over a droppable area.".to_string(),
    }
}

pub fn dropped(stage: Option<Stage>) -> String {
    match stage {
        Some(stage) => format!("Dropped in {} stage.", stage.label()),
        None => "Drag cancelled.".to_string(),
    }
}

pub fn cancelled() -> String {
    "Dragging was cancelled.".to_string()
}
