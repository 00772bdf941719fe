//! Turn and transcript primitives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::FailureKind;

/// Message sent to the provider to open a new story.
///
/// It is never stored as a turn; the narrator's reply to it is the first
/// turn of every transcript.
pub const BEGIN_TRIGGER: &str = "Begin the story.";

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The player
    User,
    /// The model-driven storyteller
    Narrator,
}

impl TurnRole {
    /// The role expected to follow this one.
    pub fn next(self) -> Self {
        match self {
            TurnRole::User => TurnRole::Narrator,
            TurnRole::Narrator => TurnRole::User,
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::User => f.write_str("user"),
            TurnRole::Narrator => f.write_str("narrator"),
        }
    }
}

/// One exchange unit in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,
    /// Who authored the turn
    pub role: TurnRole,
    /// Narrative text (narrator) or the player's action (user)
    pub content: String,
    /// Player choices offered after this turn (narrator only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Position in the transcript
    pub sequence_index: usize,
    /// Timestamp
    pub created_at: DateTime<Utc>,
    /// Set on synthetic narrator turns that stand in for a failed request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: TurnRole::User,
            content: content.into(),
            options: vec![],
            sequence_index,
            created_at: Utc::now(),
            failure: None,
        }
    }

    /// Create a new narrator turn.
    pub fn narrator(
        content: impl Into<String>,
        options: Vec<String>,
        sequence_index: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: TurnRole::Narrator,
            content: content.into(),
            options,
            sequence_index,
            created_at: Utc::now(),
            failure: None,
        }
    }

    /// Mark this turn as standing in for a failed request.
    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    /// Whether this turn was authored by the narrator.
    pub fn is_narrator(&self) -> bool {
        self.role == TurnRole::Narrator
    }

    /// Whether this turn records a failed request.
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_alternation() {
        assert_eq!(TurnRole::User.next(), TurnRole::Narrator);
        assert_eq!(TurnRole::Narrator.next(), TurnRole::User);
    }

    #[test]
    fn test_turn_serializes_lowercase_role() {
        let turn = Turn::narrator("The rain falls.", vec!["Wait".into()], 0);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "narrator");
        assert_eq!(json["options"][0], "Wait");
        assert!(json.get("failure").is_none());
    }

    #[test]
    fn test_user_turn_has_no_options() {
        let turn = Turn::user("Go left", 1);
        assert!(!turn.is_narrator());
        assert!(turn.options.is_empty());
        assert_eq!(turn.sequence_index, 1);
    }
}
