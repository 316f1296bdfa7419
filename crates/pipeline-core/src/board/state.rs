//! Board State
//!
//! Canonical grouping of opportunities into stage columns. Every known
//! opportunity sits in exactly one column. Values are treated as immutable
//! snapshots: every mutation returns a new board, which is what makes
//! rollback an O(1) pointer swap.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{sort_by_urgency, Opportunity, OpportunityId, Stage, StageRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Invalid stage \"{stage}\" for opportunity {id}. Valid stages: {valid}")]
    InvalidStage { id: String, stage: String, valid: String },
    #[error("Malformed opportunity record: {0}")]
    Malformed(String),
    #[error("Opportunity {0} is not on the board")]
    UnknownOpportunity(OpportunityId),
    #[error("Board invariant violated: {0}")]
    Invariant(String),
}

/// Position of a card on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub stage: Stage,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    columns: BTreeMap<Stage, Vec<Opportunity>>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            columns: Stage::ALL.into_iter().map(|s| (s, Vec::new())).collect(),
        }
    }
}

impl BoardState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Group raw list rows by stage.
    ///
    /// Fails on the first row whose stage is not a board column, naming the
    /// record and the valid stages. Columns are sorted by urgency.
    pub fn from_records(records: &[Value], today: NaiveDate) -> Result<Self, BoardError> {
        let mut opportunities = Vec::with_capacity(records.len());
        for record in records {
            let stage = record.get("stage").and_then(Value::as_str).unwrap_or_default();
            if Stage::parse(stage).is_none() {
                let id = record
                    .get("id")
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "?".to_string());
                return Err(BoardError::InvalidStage {
                    id,
                    stage: stage.to_string(),
                    valid: StageRegistry::describe(),
                });
            }
            let opp: Opportunity =
                serde_json::from_value(record.clone()).map_err(|e| BoardError::Malformed(e.to_string()))?;
            opportunities.push(opp);
        }
        Ok(Self::group(opportunities, today))
    }

    /// Group typed opportunities; stable within a column apart from the urgency sort
    pub fn group(opportunities: Vec<Opportunity>, today: NaiveDate) -> Self {
        let mut board = Self::default();
        for opp in opportunities {
            board.column_mut(opp.stage).push(opp);
        }
        for column in board.columns.values_mut() {
            sort_by_urgency(column, today);
        }
        board
    }

    pub fn column(&self, stage: Stage) -> &[Opportunity] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    fn column_mut(&mut self, stage: Stage) -> &mut Vec<Opportunity> {
        self.columns.entry(stage).or_default()
    }

    pub fn columns(&self) -> impl Iterator<Item = (Stage, &[Opportunity])> + '_ {
        self.columns.iter().map(|(s, v)| (*s, v.as_slice()))
    }

    pub fn locate(&self, id: OpportunityId) -> Option<Slot> {
        self.columns.iter().find_map(|(stage, column)| {
            column
                .iter()
                .position(|o| o.id == id)
                .map(|index| Slot { stage: *stage, index })
        })
    }

    pub fn get(&self, id: OpportunityId) -> Option<&Opportunity> {
        self.locate(id).map(|slot| &self.columns[&slot.stage][slot.index])
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Card counts per stage in board order
    pub fn stage_counts(&self) -> Vec<(Stage, usize)> {
        self.columns.iter().map(|(s, v)| (*s, v.len())).collect()
    }

    /// Remove the card at `from` and insert it at `to`, taking the destination stage.
    /// The destination index is clamped to the column length after removal.
    pub fn with_moved(&self, from: Slot, to: Slot) -> Result<Self, BoardError> {
        let mut next = self.clone();
        let source = next.column_mut(from.stage);
        if from.index >= source.len() {
            return Err(BoardError::Invariant(format!(
                "no card at {}[{}]",
                from.stage, from.index
            )));
        }
        let mut item = source.remove(from.index);
        item.stage = to.stage;

        let dest = next.column_mut(to.stage);
        let index = to.index.min(dest.len());
        dest.insert(index, item);
        Ok(next)
    }

    pub fn with_removed(&self, id: OpportunityId) -> Result<Self, BoardError> {
        let slot = self.locate(id).ok_or(BoardError::UnknownOpportunity(id))?;
        let mut next = self.clone();
        next.column_mut(slot.stage).remove(slot.index);
        Ok(next)
    }

    /// Insert a card at `slot`, index clamped to the column length
    pub fn with_inserted(&self, slot: Slot, mut opp: Opportunity) -> Self {
        let mut next = self.clone();
        opp.stage = slot.stage;
        let column = next.column_mut(slot.stage);
        let index = slot.index.min(column.len());
        column.insert(index, opp);
        next
    }

    /// New cards go to the top of their column
    pub fn with_prepended(&self, opp: Opportunity) -> Self {
        let mut next = self.clone();
        next.column_mut(opp.stage).insert(0, opp);
        next
    }

    /// No duplicate ids and every card sits in the column of its own stage
    pub fn check_invariants(&self) -> Result<(), BoardError> {
        let mut seen = HashSet::new();
        for (stage, column) in &self.columns {
            for opp in column {
                if opp.stage != *stage {
                    return Err(BoardError::Invariant(format!(
                        "opportunity {} has stage {} but sits in {}",
                        opp.id, opp.stage, stage
                    )));
                }
                if !seen.insert(opp.id) {
                    return Err(BoardError::Invariant(format!("opportunity {} appears twice", opp.id)));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn board() -> BoardState {
        BoardState::group(
            vec![
                Opportunity::new(1, "A", Stage::NewLead, 1, 1),
                Opportunity::new(2, "B", Stage::NewLead, 1, 1),
                Opportunity::new(3, "C", Stage::DemoScheduled, 1, 1),
            ],
            today(),
        )
    }

    #[test]
    fn test_from_records_groups_every_stage() {
        let records = vec![
            json!({"id": 1, "name": "A", "stage": "new_lead", "customer_organization_id": 1, "principal_organization_id": 2}),
            json!({"id": 2, "name": "B", "stage": "closed_won", "customer_organization_id": 1, "principal_organization_id": 2}),
        ];
        let board = BoardState::from_records(&records, today()).unwrap();
        assert_eq!(board.stage_counts().len(), 7);
        assert_eq!(board.column(Stage::ClosedWon)[0].id, 2);
        assert!(board.column(Stage::FeedbackLogged).is_empty());
        board.check_invariants().unwrap();
    }

    #[test]
    fn test_from_records_rejects_unknown_stage() {
        let records = vec![json!({"id": 9, "name": "X", "stage": "awaiting_response",
                                  "customer_organization_id": 1, "principal_organization_id": 2})];
        let err = BoardState::from_records(&records, today()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("awaiting_response"));
        assert!(msg.contains("9"));
        assert!(msg.contains("new_lead, initial_outreach"));
    }

    #[test]
    fn test_move_across_columns() {
        let b = board();
        let moved = b
            .with_moved(
                Slot { stage: Stage::NewLead, index: 0 },
                Slot { stage: Stage::DemoScheduled, index: 0 },
            )
            .unwrap();
        assert_eq!(moved.column(Stage::NewLead).len(), 1);
        assert_eq!(moved.column(Stage::DemoScheduled)[0].id, 1);
        assert_eq!(moved.get(1).unwrap().stage, Stage::DemoScheduled);
        moved.check_invariants().unwrap();
        assert_eq!(moved.len(), b.len());
        // Original untouched
        assert_eq!(b.get(1).unwrap().stage, Stage::NewLead);
    }

    #[test]
    fn test_move_clamps_index() {
        let moved = board()
            .with_moved(
                Slot { stage: Stage::NewLead, index: 0 },
                Slot { stage: Stage::NewLead, index: 99 },
            )
            .unwrap();
        let ids: Vec<u32> = moved.column(Stage::NewLead).iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_remove_and_prepend() {
        let b = board().with_removed(2).unwrap();
        assert!(b.locate(2).is_none());
        assert!(matches!(b.with_removed(2), Err(BoardError::UnknownOpportunity(2))));

        let b = b.with_prepended(Opportunity::new(4, "D", Stage::NewLead, 1, 1));
        assert_eq!(b.column(Stage::NewLead)[0].id, 4);
    }
}
