//! Opportunity pipeline board core.
//!
//! Everything here is free of UI and storage concerns: the stage catalogue,
//! health classification, the board state machine with its transition gate,
//! column preferences, the duplicate guard, and the executor that runs board
//! effects against a [`provider::DataProvider`].

pub mod board;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod duplicate;
pub mod gate;
pub mod preferences;
pub mod provider;
pub mod render;
pub mod validation;

#[cfg(test)]
mod testing;

pub use board::{BoardEffect, BoardEvent, BoardMachine, BoardState, Slot};
pub use config::BoardConfig;
pub use coordinator::{execute_effect, StageTransitionCoordinator};
pub use domain::{Opportunity, Stage, StageHealth};
pub use gate::{CloseReasonInput, GateForm, StageUpdate};
pub use provider::DataProvider;
