//! Positional scoring for submitted orderings
//!
//! Scoring is a pure function over a submitted ordering and a quiz answer
//! key: no I/O, no clock, no session state. The session engine calls it
//! when an answer arrives, and tests can call it directly without
//! standing up a session.

use crate::{ItemId, Quiz, POINTS_PER_CORRECT};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Outcome of scoring one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Number of items placed in their correct position.
    pub correct_count: u32,
    /// `correct_count * POINTS_PER_CORRECT`.
    pub total_score: u32,
    /// Per-position correctness, index 0 = position 1.
    pub placements: Vec<bool>,
}

/// Structural defects that make a submission unscorable.
///
/// A rejected submission records nothing, so the participant may retry
/// with a well-formed ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("expected {expected} items, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("item {0} appears more than once")]
    DuplicateItem(ItemId),
    #[error("item {0} is not part of this quiz")]
    UnknownItem(ItemId),
}

/// Scores `order` against the quiz answer key.
///
/// `order[i]` is the item the participant placed at position `i + 1`.
/// The submitted item set must match the quiz item set exactly; any
/// missing, duplicated, or foreign id fails the whole submission.
pub fn score_submission(order: &[ItemId], quiz: &Quiz) -> Result<ScoreResult, ScoringError> {
    let key: HashMap<ItemId, u32> = quiz
        .items
        .iter()
        .map(|item| (item.id, item.correct_position))
        .collect();

    if order.len() != key.len() {
        return Err(ScoringError::WrongLength {
            expected: key.len(),
            got: order.len(),
        });
    }

    let mut seen = HashSet::with_capacity(order.len());
    for &item_id in order {
        if !key.contains_key(&item_id) {
            return Err(ScoringError::UnknownItem(item_id));
        }
        if !seen.insert(item_id) {
            return Err(ScoringError::DuplicateItem(item_id));
        }
    }
    // Same length, all known, no duplicates: the sets are equal.

    let placements: Vec<bool> = order
        .iter()
        .enumerate()
        .map(|(index, item_id)| key[item_id] == index as u32 + 1)
        .collect();
    let correct_count = placements.iter().filter(|&&hit| hit).count() as u32;

    Ok(ScoreResult {
        correct_count,
        total_score: correct_count * POINTS_PER_CORRECT,
        placements,
    })
}
