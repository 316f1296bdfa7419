//! Board Machine
//!
//! Pure transition core for the pipeline board. Each call to
//! [`BoardMachine::handle`] takes one event and returns the effects the
//! executor must run. Nothing here performs I/O or reads the clock; results
//! of effects come back in as events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::announce;
use super::state::{BoardState, Slot};
use crate::domain::{ActivityRecord, Opportunity, OpportunityId, Stage};
use crate::gate::{validate_close, CloseReasonInput, GatePrompt, StageUpdate};
use crate::validation::ValidationErrors;

pub type Ticket = u64;

pub const MSG_PERSIST_FAILED: &str = "Error: Could not move opportunity. Reverting.";
pub const MSG_GATE_CANCELLED: &str = "Stage change cancelled";
pub const MSG_AUDIT_FAILED: &str =
    "Stage changed, but the activity log could not be updated. Please record this change manually.";

// ============================================================================
// Events and effects
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// A list fetch produced a fresh grouping
    Loaded(BoardState),
    DragStart(OpportunityId),
    /// Pointer moved over a droppable id, or off every droppable
    DragOver(Option<String>),
    DragCancel,
    /// Drop with explicit source and destination slots
    DragEnd { from: Slot, to: Slot },
    /// Drop onto a resolved droppable id (column or card)
    Drop {
        active: OpportunityId,
        over: Option<String>,
    },
    GateConfirm(CloseReasonInput),
    GateCancel,
    /// Mark as won/lost without dragging
    DirectClose {
        id: OpportunityId,
        target: Stage,
        input: CloseReasonInput,
    },
    PersistSucceeded { ticket: Ticket, at: DateTime<Utc> },
    PersistFailed { ticket: Ticket, message: String },
    /// The pre-persistence gate check rejected the update
    PersistBlocked { ticket: Ticket, errors: ValidationErrors },
    AuditLogFailed { opportunity_id: OpportunityId, message: String },
    Deleted(OpportunityId),
    Created(Opportunity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDuration {
    Normal,
    Long,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
    pub duration: NotifyDuration,
}

impl Notification {
    fn new(level: NotifyLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            duration: NotifyDuration::Normal,
        }
    }

    fn long(mut self) -> Self {
        self.duration = NotifyDuration::Long;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistRequest {
    pub ticket: Ticket,
    pub opportunity_id: OpportunityId,
    pub update: StageUpdate,
    /// Record as it was before the move
    pub previous: Opportunity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEffect {
    Persist(PersistRequest),
    CreateAuditLog(ActivityRecord),
    InvalidateCaches,
    OpenGate(GatePrompt),
    CloseGate,
    Notify(Notification),
    ValidationFailed(ValidationErrors),
    Announce(String),
}

// ============================================================================
// Machine state
// ============================================================================

/// Snapshot held while the close modal is open
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransition {
    pub opportunity_id: OpportunityId,
    pub source: Slot,
    pub dest: Slot,
    pub previous: Arc<BoardState>,
    /// Board right after the optimistic move
    pub applied: Arc<BoardState>,
    pub dragged_item: Opportunity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Dragging(OpportunityId),
    PendingGate(PendingTransition),
    Reconciling,
}

/// A persisted move awaiting its server answer
#[derive(Debug, Clone)]
struct InFlight {
    ticket: Ticket,
    opportunity_id: OpportunityId,
    source: Slot,
    dest_stage: Stage,
    previous: Arc<BoardState>,
    applied: Arc<BoardState>,
    dragged_item: Opportunity,
}

#[derive(Debug, Clone)]
pub struct BoardMachine {
    board: Arc<BoardState>,
    phase: Phase,
    in_flight: Vec<InFlight>,
    deferred_load: Option<BoardState>,
    next_ticket: Ticket,
}

impl Default for BoardMachine {
    fn default() -> Self {
        Self::new(BoardState::default())
    }
}

impl BoardMachine {
    pub fn new(board: BoardState) -> Self {
        Self {
            board: Arc::new(board),
            phase: Phase::Idle,
            in_flight: Vec::new(),
            deferred_load: None,
            next_ticket: 1,
        }
    }

    pub fn board(&self) -> &Arc<BoardState> {
        &self.board
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        match &self.phase {
            Phase::PendingGate(p) => Some(p),
            _ => None,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Id of the card being dragged, if any
    pub fn active_id(&self) -> Option<OpportunityId> {
        match self.phase {
            Phase::Dragging(id) => Some(id),
            _ => None,
        }
    }

    pub fn handle(&mut self, event: BoardEvent) -> Vec<BoardEffect> {
        match event {
            BoardEvent::Loaded(board) => self.on_loaded(board),
            BoardEvent::DragStart(id) => self.on_drag_start(id),
            BoardEvent::DragOver(over) => {
                let stage = over.as_deref().and_then(|o| self.stage_of_droppable(o));
                vec![BoardEffect::Announce(announce::moving_over(stage))]
            }
            BoardEvent::DragCancel => {
                if matches!(self.phase, Phase::Dragging(_)) {
                    self.settle();
                }
                vec![BoardEffect::Announce(announce::cancelled())]
            }
            BoardEvent::Drop { active, over } => self.on_drop(active, over),
            BoardEvent::DragEnd { from, to } => self.on_drag_end(from, to),
            BoardEvent::GateConfirm(input) => self.on_gate_confirm(input),
            BoardEvent::GateCancel => self.on_gate_cancel(),
            BoardEvent::DirectClose { id, target, input } => self.on_direct_close(id, target, input),
            BoardEvent::PersistSucceeded { ticket, at } => self.on_persist_succeeded(ticket, at),
            BoardEvent::PersistFailed { ticket, message } => self.on_persist_failed(ticket, &message),
            BoardEvent::PersistBlocked { ticket, errors } => self.on_persist_blocked(ticket, errors),
            BoardEvent::AuditLogFailed { opportunity_id, message } => {
                warn!("Audit log failed for opportunity {}: {}", opportunity_id, message);
                vec![BoardEffect::Notify(
                    Notification::new(NotifyLevel::Warning, MSG_AUDIT_FAILED).long(),
                )]
            }
            BoardEvent::Deleted(id) => self.on_deleted(id),
            BoardEvent::Created(opp) => self.on_created(opp),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    fn on_loaded(&mut self, board: BoardState) -> Vec<BoardEffect> {
        match self.phase {
            Phase::Dragging(_) | Phase::PendingGate(_) => {
                debug!("Deferring board reload until the gesture completes");
                self.deferred_load = Some(board);
            }
            Phase::Idle | Phase::Reconciling => self.replace_if_changed(board),
        }
        Vec::new()
    }

    fn replace_if_changed(&mut self, board: BoardState) {
        if *self.board != board {
            debug!("Board reloaded with {} opportunities", board.len());
            self.board = Arc::new(board);
        }
    }

    /// Leave a gesture: back to Idle, or Reconciling while writes are out
    fn settle(&mut self) {
        self.phase = if self.in_flight.is_empty() {
            Phase::Idle
        } else {
            Phase::Reconciling
        };
        if let Some(board) = self.deferred_load.take() {
            self.replace_if_changed(board);
        }
    }

    // ========================================================================
    // Drag gesture
    // ========================================================================

    fn on_drag_start(&mut self, id: OpportunityId) -> Vec<BoardEffect> {
        let mut effects = Vec::new();

        if let Phase::PendingGate(pending) = &self.phase {
            info!("New drag while gate open; rolling back opportunity {}", pending.opportunity_id);
            self.board = Self::without_pending(&self.board, pending);
            effects.push(BoardEffect::CloseGate);
        }

        match self.board.get(id) {
            Some(opp) => {
                effects.push(BoardEffect::Announce(announce::picked_up(opp)));
                self.phase = Phase::Dragging(id);
            }
            None => {
                warn!("Drag started for unknown opportunity {}", id);
                self.settle();
            }
        }
        effects
    }

    /// Turn a droppable id into a destination slot.
    ///
    /// A column id appends to that column; a card id takes that card's
    /// place. Within the source column the index is capped at the last slot
    /// so dropping onto the own column is a no-op when already last.
    pub fn resolve_drop(&self, active: OpportunityId, over: &str) -> Option<(Slot, Slot)> {
        let from = self.board.locate(active)?;

        let mut to = match Stage::parse(over) {
            Some(stage) => Slot {
                stage,
                index: self.board.column(stage).len(),
            },
            None => {
                let over_id: OpportunityId = over.parse().ok()?;
                self.board.locate(over_id)?
            }
        };

        if to.stage == from.stage {
            let last = self.board.column(from.stage).len().saturating_sub(1);
            to.index = to.index.min(last);
        }
        Some((from, to))
    }

    fn stage_of_droppable(&self, over: &str) -> Option<Stage> {
        Stage::parse(over).or_else(|| {
            over.parse::<OpportunityId>()
                .ok()
                .and_then(|id| self.board.locate(id))
                .map(|slot| slot.stage)
        })
    }

    fn on_drop(&mut self, active: OpportunityId, over: Option<String>) -> Vec<BoardEffect> {
        let Some(over) = over else {
            debug!("Dropped outside any column");
            self.settle();
            return vec![BoardEffect::Announce(announce::dropped(None))];
        };

        match self.resolve_drop(active, &over) {
            Some((from, to)) => {
                let mut effects = vec![BoardEffect::Announce(announce::dropped(Some(to.stage)))];
                effects.extend(self.on_drag_end(from, to));
                effects
            }
            None => {
                debug!("Drop target {} did not resolve", over);
                self.settle();
                vec![BoardEffect::Announce(announce::dropped(None))]
            }
        }
    }

    fn on_drag_end(&mut self, from: Slot, to: Slot) -> Vec<BoardEffect> {
        if matches!(self.phase, Phase::PendingGate(_)) {
            warn!("Drop ignored while a close reason is pending");
            return Vec::new();
        }

        if from == to {
            self.settle();
            return Vec::new();
        }

        let Some(dragged_item) = self.board.column(from.stage).get(from.index).cloned() else {
            warn!("Drop from empty slot {}[{}]", from.stage, from.index);
            self.settle();
            return Vec::new();
        };

        let previous = self.board.clone();
        let moved = match previous.with_moved(from, to) {
            Ok(board) => board,
            Err(e) => {
                warn!("Optimistic move rejected: {}", e);
                self.settle();
                return Vec::new();
            }
        };
        self.board = Arc::new(moved);
        self.deferred_load = None;

        if to.stage.is_terminal() {
            let prompt = GatePrompt {
                opportunity_id: dragged_item.id,
                opportunity_name: dragged_item.name.clone(),
                target: to.stage,
            };
            info!("Opportunity {} awaiting close reason for {}", dragged_item.id, to.stage);
            self.phase = Phase::PendingGate(PendingTransition {
                opportunity_id: dragged_item.id,
                source: from,
                dest: to,
                previous,
                applied: self.board.clone(),
                dragged_item,
            });
            return vec![BoardEffect::OpenGate(prompt)];
        }

        let update = StageUpdate::stage_only(to.stage);
        vec![self.launch(from, to.stage, previous, dragged_item, update)]
    }

    /// Record an in-flight write and build its persistence effect
    fn launch(
        &mut self,
        source: Slot,
        dest_stage: Stage,
        previous: Arc<BoardState>,
        dragged_item: Opportunity,
        update: StageUpdate,
    ) -> BoardEffect {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        debug!(
            "Persisting opportunity {} {} -> {} (ticket {})",
            dragged_item.id, source.stage, dest_stage, ticket
        );

        self.in_flight.push(InFlight {
            ticket,
            opportunity_id: dragged_item.id,
            source,
            dest_stage,
            previous,
            applied: self.board.clone(),
            dragged_item: dragged_item.clone(),
        });
        self.phase = Phase::Reconciling;
        if let Some(board) = self.deferred_load.take() {
            self.replace_if_changed(board);
        }

        BoardEffect::Persist(PersistRequest {
            ticket,
            opportunity_id: dragged_item.id,
            update,
            previous: dragged_item,
        })
    }

    // ========================================================================
    // Gate
    // ========================================================================

    fn on_gate_confirm(&mut self, input: CloseReasonInput) -> Vec<BoardEffect> {
        if !matches!(self.phase, Phase::PendingGate(_)) {
            warn!("Gate confirm without a pending transition");
            return Vec::new();
        }
        let Phase::PendingGate(pending) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return Vec::new();
        };

        match validate_close(pending.dest.stage, &input) {
            Ok(payload) => {
                let update = StageUpdate::closing(&payload);
                let previous = Self::without_pending(&self.board, &pending);
                let persist = self.launch(
                    pending.source,
                    pending.dest.stage,
                    previous,
                    pending.dragged_item,
                    update,
                );
                vec![BoardEffect::CloseGate, persist]
            }
            Err(errors) => {
                info!("Close reason rejected for opportunity {}: {}", pending.opportunity_id, errors);
                self.board = Self::without_pending(&self.board, &pending);
                self.settle();
                vec![BoardEffect::CloseGate, BoardEffect::ValidationFailed(errors)]
            }
        }
    }

    fn on_gate_cancel(&mut self) -> Vec<BoardEffect> {
        if !matches!(self.phase, Phase::PendingGate(_)) {
            return Vec::new();
        }
        let Phase::PendingGate(pending) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return Vec::new();
        };

        info!("Stage change cancelled for opportunity {}", pending.opportunity_id);
        self.board = Self::without_pending(&self.board, &pending);
        self.settle();
        vec![
            BoardEffect::CloseGate,
            BoardEffect::Notify(Notification::new(NotifyLevel::Info, MSG_GATE_CANCELLED)),
        ]
    }

    /// `board` with the gated move undone.
    ///
    /// The drop-time snapshot is only valid while nothing else touched the
    /// board; after that the card alone goes back to its source slot.
    fn without_pending(board: &Arc<BoardState>, pending: &PendingTransition) -> Arc<BoardState> {
        if Arc::ptr_eq(board, &pending.applied) {
            return pending.previous.clone();
        }
        match board.with_removed(pending.opportunity_id) {
            Ok(without) => Arc::new(without.with_inserted(pending.source, pending.dragged_item.clone())),
            Err(e) => {
                warn!("Pending card {} no longer on the board: {}", pending.opportunity_id, e);
                board.clone()
            }
        }
    }

    fn on_direct_close(&mut self, id: OpportunityId, target: Stage, input: CloseReasonInput) -> Vec<BoardEffect> {
        let payload = match validate_close(target, &input) {
            Ok(payload) => payload,
            Err(errors) => return vec![BoardEffect::ValidationFailed(errors)],
        };

        if matches!(self.phase, Phase::PendingGate(_) | Phase::Dragging(_)) {
            warn!("Direct close of {} ignored during a drag", id);
            return Vec::new();
        }

        let Some(from) = self.board.locate(id) else {
            warn!("Direct close for unknown opportunity {}", id);
            return Vec::new();
        };
        let dragged_item = self.board.column(from.stage)[from.index].clone();
        let to = Slot {
            stage: target,
            index: self.board.column(target).len(),
        };

        let previous = self.board.clone();
        match previous.with_moved(from, to) {
            Ok(board) => self.board = Arc::new(board),
            Err(e) => {
                warn!("Direct close rejected: {}", e);
                return Vec::new();
            }
        }
        vec![self.launch(from, target, previous, dragged_item, StageUpdate::closing(&payload))]
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    fn take_in_flight(&mut self, ticket: Ticket) -> Option<InFlight> {
        let pos = self.in_flight.iter().position(|f| f.ticket == ticket)?;
        Some(self.in_flight.remove(pos))
    }

    fn finish_reconcile(&mut self) {
        if matches!(self.phase, Phase::Reconciling) {
            self.settle();
        }
    }

    fn on_persist_succeeded(&mut self, ticket: Ticket, at: DateTime<Utc>) -> Vec<BoardEffect> {
        let Some(flight) = self.take_in_flight(ticket) else {
            warn!("Success for unknown ticket {}", ticket);
            return Vec::new();
        };
        self.finish_reconcile();

        info!(
            "Opportunity {} moved {} -> {}",
            flight.opportunity_id, flight.source.stage, flight.dest_stage
        );

        let mut effects = Vec::new();
        if flight.source.stage != flight.dest_stage {
            effects.push(BoardEffect::CreateAuditLog(ActivityRecord::stage_change(
                flight.opportunity_id,
                flight.dragged_item.customer_organization_id,
                flight.source.stage,
                flight.dest_stage,
                at,
            )));
        }
        effects.push(BoardEffect::InvalidateCaches);
        effects.push(BoardEffect::Notify(Notification::new(
            NotifyLevel::Success,
            format!("Moved to {}", flight.dest_stage.label()),
        )));
        effects
    }

    fn on_persist_failed(&mut self, ticket: Ticket, message: &str) -> Vec<BoardEffect> {
        let Some(flight) = self.take_in_flight(ticket) else {
            warn!("Failure for unknown ticket {}", ticket);
            return Vec::new();
        };
        warn!("Persisting opportunity {} failed: {}", flight.opportunity_id, message);
        self.roll_back(&flight);
        self.finish_reconcile();
        vec![BoardEffect::Notify(Notification::new(NotifyLevel::Warning, MSG_PERSIST_FAILED))]
    }

    fn on_persist_blocked(&mut self, ticket: Ticket, errors: ValidationErrors) -> Vec<BoardEffect> {
        let Some(flight) = self.take_in_flight(ticket) else {
            return Vec::new();
        };
        warn!("Update for opportunity {} blocked: {}", flight.opportunity_id, errors);
        self.roll_back(&flight);
        self.finish_reconcile();
        vec![BoardEffect::ValidationFailed(errors)]
    }

    /// Undo one in-flight move.
    ///
    /// If nothing changed since the move, the snapshot is restored as is.
    /// Otherwise only the moved card returns to its source slot so later
    /// moves survive.
    fn roll_back(&mut self, flight: &InFlight) {
        if Arc::ptr_eq(&self.board, &flight.applied) {
            self.board = flight.previous.clone();
            return;
        }

        match self.board.with_removed(flight.opportunity_id) {
            Ok(without) => {
                let restored = without.with_inserted(flight.source, flight.dragged_item.clone());
                self.board = Arc::new(restored);
            }
            Err(e) => warn!("Nothing to roll back for {}: {}", flight.opportunity_id, e),
        }
    }

    // ========================================================================
    // Optimistic create/delete
    // ========================================================================

    fn on_deleted(&mut self, id: OpportunityId) -> Vec<BoardEffect> {
        match self.board.with_removed(id) {
            Ok(board) => self.board = Arc::new(board),
            Err(e) => warn!("Delete ignored: {}", e),
        }
        Vec::new()
    }

    fn on_created(&mut self, opp: Opportunity) -> Vec<BoardEffect> {
        if self.board.locate(opp.id).is_some() {
            debug!("Opportunity {} already on the board", opp.id);
            return Vec::new();
        }
        self.board = Arc::new(self.board.with_prepended(opp));
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LossReason, WinReason};
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn machine() -> BoardMachine {
        BoardMachine::new(BoardState::group(
            vec![
                Opportunity::new(1, "Alpha", Stage::NewLead, 100, 200),
                Opportunity::new(2, "Bravo", Stage::NewLead, 101, 200),
                Opportunity::new(3, "Charlie", Stage::DemoScheduled, 102, 200),
            ],
            today(),
        ))
    }

    fn slot(stage: Stage, index: usize) -> Slot {
        Slot { stage, index }
    }

    fn persist_of(effects: &[BoardEffect]) -> Option<&PersistRequest> {
        effects.iter().find_map(|e| match e {
            BoardEffect::Persist(p) => Some(p),
            _ => None,
        })
    }

    #[test]
    fn test_same_slot_drop_is_noop() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::DragStart(1));
        let effects = m.handle(BoardEvent::DragEnd {
            from: slot(Stage::NewLead, 0),
            to: slot(Stage::NewLead, 0),
        });
        assert!(effects.is_empty());
        assert!(Arc::ptr_eq(&before, m.board()));
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_drop_on_own_column_when_last_is_noop() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::DragStart(2));
        let effects = m.handle(BoardEvent::Drop {
            active: 2,
            over: Some("new_lead".to_string()),
        });
        assert!(persist_of(&effects).is_none());
        assert!(Arc::ptr_eq(&before, m.board()));
    }

    #[test]
    fn test_move_persists_and_reconciles() {
        let mut m = machine();
        m.handle(BoardEvent::DragStart(1));
        let effects = m.handle(BoardEvent::Drop {
            active: 1,
            over: Some("3".to_string()),
        });
        let req = persist_of(&effects).unwrap().clone();
        assert_eq!(req.update, StageUpdate::stage_only(Stage::DemoScheduled));
        assert_eq!(req.previous.stage, Stage::NewLead);
        assert_eq!(m.board().column(Stage::DemoScheduled)[0].id, 1);
        assert_eq!(*m.phase(), Phase::Reconciling);

        let effects = m.handle(BoardEvent::PersistSucceeded {
            ticket: req.ticket,
            at: Utc::now(),
        });
        assert_eq!(*m.phase(), Phase::Idle);
        let audit = effects
            .iter()
            .find_map(|e| match e {
                BoardEffect::CreateAuditLog(a) => Some(a),
                _ => None,
            })
            .unwrap();
        assert_eq!(audit.subject, "Stage changed: New Lead → Demo Scheduled");
        assert_eq!(audit.organization_id, 100);
        assert!(effects.contains(&BoardEffect::InvalidateCaches));
        assert!(effects.iter().any(|e| matches!(e,
            BoardEffect::Notify(n) if n.message == "Moved to Demo Scheduled")));
    }

    #[test]
    fn test_reorder_within_column_skips_audit() {
        let mut m = machine();
        m.handle(BoardEvent::DragStart(1));
        let effects = m.handle(BoardEvent::DragEnd {
            from: slot(Stage::NewLead, 0),
            to: slot(Stage::NewLead, 1),
        });
        let ticket = persist_of(&effects).unwrap().ticket;
        let effects = m.handle(BoardEvent::PersistSucceeded { ticket, at: Utc::now() });
        assert!(!effects.iter().any(|e| matches!(e, BoardEffect::CreateAuditLog(_))));
    }

    #[test]
    fn test_persist_failure_restores_exact_snapshot() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::DragStart(1));
        let effects = m.handle(BoardEvent::DragEnd {
            from: slot(Stage::NewLead, 0),
            to: slot(Stage::FeedbackLogged, 0),
        });
        let ticket = persist_of(&effects).unwrap().ticket;

        let effects = m.handle(BoardEvent::PersistFailed {
            ticket,
            message: "500".to_string(),
        });
        assert!(Arc::ptr_eq(&before, m.board()));
        assert_eq!(**m.board(), *before);
        assert!(effects.iter().any(|e| matches!(e,
            BoardEffect::Notify(n) if n.message == MSG_PERSIST_FAILED)));
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_failure_after_later_move_only_reverts_own_card() {
        let mut m = machine();
        m.handle(BoardEvent::DragStart(1));
        let first = m.handle(BoardEvent::DragEnd {
            from: slot(Stage::NewLead, 0),
            to: slot(Stage::InitialOutreach, 0),
        });
        let t1 = persist_of(&first).unwrap().ticket;

        m.handle(BoardEvent::DragStart(3));
        let second = m.handle(BoardEvent::DragEnd {
            from: slot(Stage::DemoScheduled, 0),
            to: slot(Stage::FeedbackLogged, 0),
        });
        let t2 = persist_of(&second).unwrap().ticket;
        assert_eq!(m.in_flight_count(), 2);

        m.handle(BoardEvent::PersistFailed { ticket: t1, message: "409".to_string() });
        assert_eq!(m.board().locate(1), Some(slot(Stage::NewLead, 0)));
        assert_eq!(m.board().get(1).unwrap().stage, Stage::NewLead);
        assert_eq!(m.board().locate(3), Some(slot(Stage::FeedbackLogged, 0)));
        assert_eq!(*m.phase(), Phase::Reconciling);
        m.board().check_invariants().unwrap();

        m.handle(BoardEvent::PersistSucceeded { ticket: t2, at: Utc::now() });
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_terminal_drop_opens_gate_without_persisting() {
        let mut m = machine();
        m.handle(BoardEvent::DragStart(3));
        let effects = m.handle(BoardEvent::Drop {
            active: 3,
            over: Some("closed_won".to_string()),
        });
        assert!(persist_of(&effects).is_none());
        assert!(effects.iter().any(|e| matches!(e,
            BoardEffect::OpenGate(p) if p.target == Stage::ClosedWon && p.opportunity_name == "Charlie")));
        assert!(m.pending().is_some());
        assert_eq!(m.board().column(Stage::ClosedWon)[0].id, 3);
    }

    #[test]
    fn test_gate_cancel_rolls_back() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::DragStart(3));
        m.handle(BoardEvent::DragEnd {
            from: slot(Stage::DemoScheduled, 0),
            to: slot(Stage::ClosedLost, 0),
        });
        let effects = m.handle(BoardEvent::GateCancel);
        assert!(Arc::ptr_eq(&before, m.board()));
        assert!(effects.contains(&BoardEffect::CloseGate));
        assert!(effects.iter().any(|e| matches!(e,
            BoardEffect::Notify(n) if n.message == MSG_GATE_CANCELLED)));
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_gate_confirm_without_reason_never_persists() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::DragStart(3));
        m.handle(BoardEvent::DragEnd {
            from: slot(Stage::DemoScheduled, 0),
            to: slot(Stage::ClosedWon, 0),
        });
        let effects = m.handle(BoardEvent::GateConfirm(CloseReasonInput::won(WinReason::Other)));
        assert!(persist_of(&effects).is_none());
        assert!(effects.iter().any(|e| matches!(e, BoardEffect::ValidationFailed(_))));
        assert!(Arc::ptr_eq(&before, m.board()));
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_gate_confirm_persists_reason() {
        let mut m = machine();
        m.handle(BoardEvent::DragStart(3));
        m.handle(BoardEvent::DragEnd {
            from: slot(Stage::DemoScheduled, 0),
            to: slot(Stage::ClosedLost, 0),
        });
        let effects = m.handle(BoardEvent::GateConfirm(
            CloseReasonInput::lost(LossReason::Other).with_notes("went with incumbent"),
        ));
        let req = persist_of(&effects).unwrap();
        assert_eq!(req.update.stage, Stage::ClosedLost);
        assert_eq!(req.update.loss_reason, Some(LossReason::Other));
        assert_eq!(req.update.close_reason_notes.as_deref(), Some("went with incumbent"));
        assert_eq!(*m.phase(), Phase::Reconciling);
    }

    #[test]
    fn test_new_drag_rolls_back_pending_gate() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::DragStart(3));
        m.handle(BoardEvent::DragEnd {
            from: slot(Stage::DemoScheduled, 0),
            to: slot(Stage::ClosedWon, 0),
        });
        let effects = m.handle(BoardEvent::DragStart(1));
        assert!(effects.contains(&BoardEffect::CloseGate));
        assert!(Arc::ptr_eq(&before, m.board()));
        assert_eq!(*m.phase(), Phase::Dragging(1));
    }

    /// Card 1 moves with its write in flight, card 3 waits at the gate,
    /// then card 1's write fails.
    fn gate_open_after_failed_move() -> (BoardMachine, BoardState) {
        let mut m = machine();
        let original = (**m.board()).clone();
        m.handle(BoardEvent::DragStart(1));
        let effects = m.handle(BoardEvent::DragEnd {
            from: slot(Stage::NewLead, 0),
            to: slot(Stage::InitialOutreach, 0),
        });
        let t1 = persist_of(&effects).unwrap().ticket;

        m.handle(BoardEvent::DragStart(3));
        m.handle(BoardEvent::DragEnd {
            from: slot(Stage::DemoScheduled, 0),
            to: slot(Stage::ClosedWon, 0),
        });
        assert!(m.pending().is_some());

        m.handle(BoardEvent::PersistFailed { ticket: t1, message: "500".to_string() });
        assert_eq!(m.board().locate(1), Some(slot(Stage::NewLead, 0)));
        (m, original)
    }

    #[test]
    fn test_gate_cancel_keeps_earlier_rollback() {
        let (mut m, original) = gate_open_after_failed_move();
        m.handle(BoardEvent::GateCancel);
        assert_eq!(**m.board(), original);
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_rejected_reason_keeps_earlier_rollback() {
        let (mut m, original) = gate_open_after_failed_move();
        let effects = m.handle(BoardEvent::GateConfirm(CloseReasonInput::default()));
        assert!(effects.iter().any(|e| matches!(e, BoardEffect::ValidationFailed(_))));
        assert_eq!(**m.board(), original);
    }

    #[test]
    fn test_new_drag_keeps_earlier_rollback() {
        let (mut m, original) = gate_open_after_failed_move();
        m.handle(BoardEvent::DragStart(2));
        assert_eq!(**m.board(), original);
        assert_eq!(*m.phase(), Phase::Dragging(2));
    }

    #[test]
    fn test_failed_close_after_earlier_rollback_restores_board() {
        let (mut m, original) = gate_open_after_failed_move();
        let effects = m.handle(BoardEvent::GateConfirm(CloseReasonInput::won(WinReason::Timing)));
        let ticket = persist_of(&effects).unwrap().ticket;
        assert_eq!(m.board().locate(3), Some(slot(Stage::ClosedWon, 0)));
        assert_eq!(m.board().locate(1), Some(slot(Stage::NewLead, 0)));

        m.handle(BoardEvent::PersistFailed { ticket, message: "500".to_string() });
        assert_eq!(**m.board(), original);
        m.board().check_invariants().unwrap();
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_audit_failure_keeps_move() {
        let mut m = machine();
        m.handle(BoardEvent::DragStart(1));
        let effects = m.handle(BoardEvent::DragEnd {
            from: slot(Stage::NewLead, 0),
            to: slot(Stage::InitialOutreach, 0),
        });
        let ticket = persist_of(&effects).unwrap().ticket;
        m.handle(BoardEvent::PersistSucceeded { ticket, at: Utc::now() });
        let moved = m.board().clone();

        let effects = m.handle(BoardEvent::AuditLogFailed {
            opportunity_id: 1,
            message: "timeout".to_string(),
        });
        assert!(Arc::ptr_eq(&moved, m.board()));
        assert!(effects.iter().any(|e| matches!(e,
            BoardEffect::Notify(n) if n.duration == NotifyDuration::Long && n.level == NotifyLevel::Warning)));
    }

    #[test]
    fn test_drop_outside_and_escape_leave_board_untouched() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::DragStart(1));
        let effects = m.handle(BoardEvent::Drop { active: 1, over: None });
        assert_eq!(effects, vec![BoardEffect::Announce("Drag cancelled.".to_string())]);

        m.handle(BoardEvent::DragStart(1));
        m.handle(BoardEvent::DragCancel);
        assert!(Arc::ptr_eq(&before, m.board()));
        assert_eq!(*m.phase(), Phase::Idle);
    }

    #[test]
    fn test_reload_deferred_while_dragging() {
        let mut m = machine();
        m.handle(BoardEvent::DragStart(1));
        let fresh = BoardState::group(vec![Opportunity::new(9, "Zulu", Stage::NewLead, 1, 1)], today());
        m.handle(BoardEvent::Loaded(fresh.clone()));
        assert!(m.board().get(9).is_none());

        m.handle(BoardEvent::DragCancel);
        assert_eq!(**m.board(), fresh);
    }

    #[test]
    fn test_equal_reload_keeps_board_reference() {
        let mut m = machine();
        let before = m.board().clone();
        m.handle(BoardEvent::Loaded((*before).clone()));
        assert!(Arc::ptr_eq(&before, m.board()));
    }

    #[test]
    fn test_direct_close_runs_gate() {
        let mut m = machine();
        let effects = m.handle(BoardEvent::DirectClose {
            id: 1,
            target: Stage::ClosedWon,
            input: CloseReasonInput::default(),
        });
        assert!(persist_of(&effects).is_none());
        assert_eq!(m.board().get(1).unwrap().stage, Stage::NewLead);

        let effects = m.handle(BoardEvent::DirectClose {
            id: 1,
            target: Stage::ClosedWon,
            input: CloseReasonInput::won(WinReason::Relationship),
        });
        let req = persist_of(&effects).unwrap();
        assert_eq!(req.update.win_reason, Some(WinReason::Relationship));
        assert_eq!(m.board().get(1).unwrap().stage, Stage::ClosedWon);
    }

    #[test]
    fn test_create_and_delete() {
        let mut m = machine();
        m.handle(BoardEvent::Created(Opportunity::new(7, "Echo", Stage::DemoScheduled, 1, 1)));
        assert_eq!(m.board().column(Stage::DemoScheduled)[0].id, 7);
        m.handle(BoardEvent::Deleted(7));
        assert!(m.board().get(7).is_none());
        m.board().check_invariants().unwrap();
    }
}
