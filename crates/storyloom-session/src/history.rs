//! Transcript ownership and branching.
//!
//! The [`HistoryStore`] is the single source of truth for a story's turns.
//! Branching is expressed purely as truncation: rewinding keeps a prefix and
//! regenerating drops the final user/narrator pair.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storyloom_core::{Error, FailureKind, Turn, TurnRole};

/// Maximum characters of narrative shown in a [`SceneMarker`].
const SUMMARY_CHARS: usize = 60;

/// Transcript mutation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("expected a {expected} turn, got {got}")]
    OutOfOrder { expected: TurnRole, got: TurnRole },

    #[error("turn index {index} is out of range (transcript has {len} turns)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("transcript does not end with a user/narrator pair")]
    NoTrailingPair,
}

impl From<HistoryError> for Error {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::IndexOutOfRange { index, len } => Error::IndexOutOfRange { index, len },
            HistoryError::NoTrailingPair => Error::NothingToRegenerate,
            HistoryError::OutOfOrder { .. } => Error::Internal(err.to_string()),
        }
    }
}

/// One entry of the story timeline, derived from a narrator turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneMarker {
    /// Index of the narrator turn; a valid rewind target
    pub index: usize,
    /// The player action that led to this scene
    pub choice: Option<String>,
    /// Shortened single-line narrative
    pub summary: String,
}

/// Ordered, role-alternating transcript.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    turns: Vec<Turn>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, assigning its position.
    ///
    /// The first turn must be a narrator turn and roles must alternate.
    pub fn append(
        &mut self,
        role: TurnRole,
        content: impl Into<String>,
        options: Vec<String>,
        failure: Option<FailureKind>,
    ) -> Result<&Turn, HistoryError> {
        let expected = self.expected_role();
        if role != expected {
            return Err(HistoryError::OutOfOrder {
                expected,
                got: role,
            });
        }

        let index = self.turns.len();
        let turn = match role {
            TurnRole::User => Turn::user(content, index),
            TurnRole::Narrator => {
                let turn = Turn::narrator(content, options, index);
                match failure {
                    Some(kind) => turn.with_failure(kind),
                    None => turn,
                }
            }
        };
        self.turns.push(turn);
        Ok(&self.turns[index])
    }

    pub fn append_user(&mut self, content: impl Into<String>) -> Result<&Turn, HistoryError> {
        self.append(TurnRole::User, content, Vec::new(), None)
    }

    pub fn append_narrator(
        &mut self,
        content: impl Into<String>,
        options: Vec<String>,
        failure: Option<FailureKind>,
    ) -> Result<&Turn, HistoryError> {
        self.append(TurnRole::Narrator, content, options, failure)
    }

    /// Keep turns `[0..=index]`.
    pub fn truncate(&mut self, index: usize) -> Result<(), HistoryError> {
        let len = self.turns.len();
        if index >= len {
            return Err(HistoryError::IndexOutOfRange { index, len });
        }
        self.turns.truncate(index + 1);
        Ok(())
    }

    /// Remove the trailing user/narrator pair, returning `(user, narrator)`.
    pub fn drop_last_pair(&mut self) -> Result<(Turn, Turn), HistoryError> {
        let len = self.turns.len();
        let has_pair = len >= 2
            && self.turns[len - 1].role == TurnRole::Narrator
            && self.turns[len - 2].role == TurnRole::User;
        if !has_pair {
            return Err(HistoryError::NoTrailingPair);
        }

        let mut removed = self.turns.split_off(len - 2).into_iter();
        match (removed.next(), removed.next()) {
            (Some(user), Some(narrator)) => Ok((user, narrator)),
            _ => Err(HistoryError::NoTrailingPair),
        }
    }

    /// One marker per narrator turn, in transcript order.
    pub fn timeline(&self) -> Vec<SceneMarker> {
        self.turns
            .iter()
            .enumerate()
            .filter(|(_, turn)| turn.is_narrator())
            .map(|(index, turn)| SceneMarker {
                index,
                choice: index
                    .checked_sub(1)
                    .and_then(|prev| self.turns.get(prev))
                    .filter(|prev| prev.role == TurnRole::User)
                    .map(|prev| prev.content.clone()),
                summary: summarize(&turn.content),
            })
            .collect()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Role the next appended turn must have.
    pub fn expected_role(&self) -> TurnRole {
        self.turns
            .last()
            .map_or(TurnRole::Narrator, |turn| turn.role.next())
    }
}

fn summarize(content: &str) -> String {
    let single_line: String = content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let mut summary: String = single_line.chars().take(SUMMARY_CHARS).collect();
    if single_line.chars().count() > SUMMARY_CHARS {
        summary.push_str("...");
    }
    summary
}
