//! Stage Transition Coordinator
//!
//! Thin executor around [`BoardMachine`]. Network effects run against the
//! data provider and their outcome is fed back into the machine as events;
//! everything else is handed to the caller for display.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::board::{BoardEffect, BoardError, BoardEvent, BoardMachine, BoardState};
use crate::gate::ensure_update_allowed;
use crate::provider::{
    CreateParams, DataProvider, ListParams, ProviderError, Sort, UpdateParams, ACTIVITIES, OPPORTUNITIES,
};

/// Upper bound on opportunities fetched for one board load
pub const BOARD_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Run one effect. Returns the event describing its outcome, or `None`
/// for effects that are not the executor's to run.
pub async fn execute_effect<P: DataProvider + ?Sized>(
    provider: &P,
    effect: &BoardEffect,
    now: DateTime<Utc>,
) -> Option<BoardEvent> {
    match effect {
        BoardEffect::Persist(req) => {
            if let Err(errors) = ensure_update_allowed(&req.update) {
                return Some(BoardEvent::PersistBlocked {
                    ticket: req.ticket,
                    errors,
                });
            }

            let params = match (serde_json::to_value(&req.update), serde_json::to_value(&req.previous)) {
                (Ok(data), Ok(previous_data)) => UpdateParams {
                    id: req.opportunity_id,
                    data,
                    previous_data,
                },
                (Err(e), _) | (_, Err(e)) => {
                    return Some(BoardEvent::PersistFailed {
                        ticket: req.ticket,
                        message: e.to_string(),
                    })
                }
            };

            match provider.update(OPPORTUNITIES, params).await {
                Ok(_) => Some(BoardEvent::PersistSucceeded {
                    ticket: req.ticket,
                    at: now,
                }),
                Err(e) => {
                    error!("Update of opportunity {} failed: {}", req.opportunity_id, e);
                    Some(BoardEvent::PersistFailed {
                        ticket: req.ticket,
                        message: e.to_string(),
                    })
                }
            }
        }
        BoardEffect::CreateAuditLog(record) => {
            let result = match serde_json::to_value(record) {
                Ok(data) => provider
                    .create(ACTIVITIES, CreateParams { data })
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(()) => {
                    debug!("Audit log written for opportunity {}", record.opportunity_id);
                    None
                }
                Err(message) => Some(BoardEvent::AuditLogFailed {
                    opportunity_id: record.opportunity_id,
                    message,
                }),
            }
        }
        _ => None,
    }
}

/// Owns the machine and a provider, and runs effects to completion
pub struct StageTransitionCoordinator<P: DataProvider> {
    provider: P,
    machine: BoardMachine,
}

impl<P: DataProvider> StageTransitionCoordinator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            machine: BoardMachine::default(),
        }
    }

    pub fn machine(&self) -> &BoardMachine {
        &self.machine
    }

    pub fn board(&self) -> &BoardState {
        self.machine.board()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Feed an event and drain every effect it causes.
    ///
    /// Returns the effects meant for the UI, in order.
    pub async fn dispatch(&mut self, event: BoardEvent, now: DateTime<Utc>) -> Vec<BoardEffect> {
        let mut queue = vec![event];
        let mut ui = Vec::new();

        while !queue.is_empty() {
            let event = queue.remove(0);
            for effect in self.machine.handle(event) {
                match execute_effect(&self.provider, &effect, now).await {
                    Some(outcome) => queue.push(outcome),
                    None => {
                        if !matches!(effect, BoardEffect::Persist(_) | BoardEffect::CreateAuditLog(_)) {
                            ui.push(effect);
                        }
                    }
                }
            }
        }
        ui
    }

    /// Fetch every open opportunity and load it into the board
    pub async fn refresh(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Result<Vec<BoardEffect>, CoordinatorError> {
        let list = self
            .provider
            .get_list(
                OPPORTUNITIES,
                ListParams::new()
                    .not_deleted()
                    .page(1, BOARD_PAGE_SIZE)
                    .sort(Sort::desc("created_at")),
            )
            .await?;
        let board = BoardState::from_records(&list.data, today)?;
        info!("Loaded {} of {} opportunities", board.len(), list.total);
        Ok(self.dispatch(BoardEvent::Loaded(board), now).await)
    }
}
