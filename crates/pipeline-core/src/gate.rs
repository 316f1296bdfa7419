//! Transition Gate
//!
//! Entry into a terminal stage requires a captured reason. The same check
//! runs when the close modal is submitted and again right before the update
//! is persisted, so paths that skip the modal are still covered.

use serde::{Deserialize, Serialize};

use crate::domain::{CloseReason, LossReason, OpportunityId, Stage, WinReason};
use crate::validation::ValidationErrors;

pub const CLOSE_NOTES_MAX_LEN: usize = 500;

pub const FIELD_STAGE: &str = "stage";
pub const FIELD_WIN_REASON: &str = "win_reason";
pub const FIELD_LOSS_REASON: &str = "loss_reason";
pub const FIELD_CLOSE_REASON_NOTES: &str = "close_reason_notes";

/// Raw reason fields as the modal (or an action menu) supplies them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReasonInput {
    #[serde(default)]
    pub win_reason: Option<WinReason>,
    #[serde(default)]
    pub loss_reason: Option<LossReason>,
    #[serde(default)]
    pub close_reason_notes: Option<String>,
}

impl CloseReasonInput {
    pub fn won(reason: WinReason) -> Self {
        Self {
            win_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn lost(reason: LossReason) -> Self {
        Self {
            loss_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.close_reason_notes = Some(notes.into());
        self
    }
}

/// Fields written by a stage change. Serializes to the `data` payload of
/// the update call; reason fields are omitted for non-terminal stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdate {
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_reason: Option<WinReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_reason: Option<LossReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason_notes: Option<String>,
}

impl StageUpdate {
    /// Plain move between columns
    pub fn stage_only(stage: Stage) -> Self {
        Self {
            stage,
            win_reason: None,
            loss_reason: None,
            close_reason_notes: None,
        }
    }

    /// Move into a terminal stage with its validated reason
    pub fn closing(payload: &ClosePayload) -> Self {
        let (win_reason, loss_reason) = match payload.reason {
            CloseReason::Won(r) => (Some(r), None),
            CloseReason::Lost(r) => (None, Some(r)),
        };
        Self {
            stage: payload.stage,
            win_reason,
            loss_reason,
            close_reason_notes: payload.notes.clone(),
        }
    }

    fn reason_input(&self) -> CloseReasonInput {
        CloseReasonInput {
            win_reason: self.win_reason,
            loss_reason: self.loss_reason,
            close_reason_notes: self.close_reason_notes.clone(),
        }
    }
}

/// A reason that passed validation for a given terminal stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePayload {
    pub stage: Stage,
    pub reason: CloseReason,
    pub notes: Option<String>,
}

/// Validate a close reason against the terminal stage it is entering.
///
/// Only the reason matching the stage is carried into the payload, so a
/// stray win reason on a lost deal never reaches persistence.
pub fn validate_close(stage: Stage, input: &CloseReasonInput) -> Result<ClosePayload, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let reason = match stage {
        Stage::ClosedWon => match input.win_reason {
            Some(r) => Some(CloseReason::Won(r)),
            None => {
                errors.push(FIELD_WIN_REASON, "Win reason is required when closing as won");
                None
            }
        },
        Stage::ClosedLost => match input.loss_reason {
            Some(r) => Some(CloseReason::Lost(r)),
            None => {
                errors.push(FIELD_LOSS_REASON, "Loss reason is required when closing as lost");
                None
            }
        },
        other => {
            errors.push(
                FIELD_STAGE,
                format!("{} is not a closed stage", other.label()),
            );
            None
        }
    };

    let notes = input
        .close_reason_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    if reason.map(|r| r.is_other()).unwrap_or(false) && notes.is_none() {
        errors.push(
            FIELD_CLOSE_REASON_NOTES,
            "Please specify the reason in notes when selecting 'Other'",
        );
    }

    if let Some(n) = &notes {
        if n.chars().count() > CLOSE_NOTES_MAX_LEN {
            errors.push(
                FIELD_CLOSE_REASON_NOTES,
                format!("Close reason notes must be {} characters or less", CLOSE_NOTES_MAX_LEN),
            );
        }
    }

    match reason {
        Some(reason) if errors.is_empty() => Ok(ClosePayload { stage, reason, notes }),
        _ => Err(errors),
    }
}

/// Re-check an update immediately before it is persisted.
/// Non-terminal moves always pass.
pub fn ensure_update_allowed(update: &StageUpdate) -> Result<(), ValidationErrors> {
    if !update.stage.is_terminal() {
        return Ok(());
    }
    validate_close(update.stage, &update.reason_input()).map(|_| ())
}

/// What the board asks the close modal to collect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatePrompt {
    pub opportunity_id: OpportunityId,
    pub opportunity_name: String,
    pub target: Stage,
}

/// State of the close modal while it is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateForm {
    pub prompt: GatePrompt,
    input: CloseReasonInput,
}

impl GateForm {
    pub fn new(prompt: GatePrompt) -> Self {
        Self {
            prompt,
            input: CloseReasonInput::default(),
        }
    }

    pub fn target(&self) -> Stage {
        self.prompt.target
    }

    pub fn input(&self) -> &CloseReasonInput {
        &self.input
    }

    pub fn select_win_reason(&mut self, reason: Option<WinReason>) {
        self.input.win_reason = reason;
    }

    pub fn select_loss_reason(&mut self, reason: Option<LossReason>) {
        self.input.loss_reason = reason;
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        let notes = notes.into();
        self.input.close_reason_notes = if notes.is_empty() { None } else { Some(notes) };
    }

    /// Notes are mandatory once "other" is selected
    pub fn notes_required(&self) -> bool {
        match self.prompt.target {
            Stage::ClosedWon => self.input.win_reason.map(|r| r.is_other()).unwrap_or(false),
            Stage::ClosedLost => self.input.loss_reason.map(|r| r.is_other()).unwrap_or(false),
            _ => false,
        }
    }

    /// Drives the enabled state of the confirm control
    pub fn can_confirm(&self) -> bool {
        validate_close(self.prompt.target, &self.input).is_ok()
    }

    pub fn errors(&self) -> Option<ValidationErrors> {
        validate_close(self.prompt.target, &self.input).err()
    }

    /// Hand the collected input back for the board's gate-confirm step
    pub fn submit(&self) -> Result<CloseReasonInput, ValidationErrors> {
        validate_close(self.prompt.target, &self.input).map(|_| self.input.clone())
    }
}
