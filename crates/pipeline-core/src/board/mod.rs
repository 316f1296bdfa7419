//! Pipeline Board
//!
//! Board state snapshots and the pure transition machine that drives them.

pub mod announce;
mod machine;
mod state;

pub use machine::{
    BoardEffect, BoardEvent, BoardMachine, Notification, NotifyDuration, NotifyLevel, PendingTransition,
    PersistRequest, Phase, Ticket, MSG_AUDIT_FAILED, MSG_GATE_CANCELLED, MSG_PERSIST_FAILED,
};
pub use state::{BoardError, BoardState, Slot};
