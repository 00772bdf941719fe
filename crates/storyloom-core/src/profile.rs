//! Player character profile.

use serde::{Deserialize, Serialize};

/// Free-text description of the player's character.
///
/// Supplied once when a story starts and folded into the system prompt on
/// every (re)initialisation of the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Name or nickname
    pub name: String,
    /// Standing or occupation in the story world
    pub role: String,
    /// Distinguishing looks
    pub appearance: String,
    /// Backstory
    pub background: String,
}

impl CharacterProfile {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        appearance: impl Into<String>,
        background: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            appearance: appearance.into(),
            background: background.into(),
        }
    }
}

impl Default for CharacterProfile {
    fn default() -> Self {
        Self {
            name: "Ah Keung".to_string(),
            role: "Street-level runner".to_string(),
            appearance: "Worn leather jacket, cold eyes, a faint scar on the right cheek".to_string(),
            background: "Grew up around the fruit market and has run errands for the same boss \
                         for three years. Quick to act, slow to talk."
                .to_string(),
        }
    }
}
