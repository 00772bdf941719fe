//! Provider adapter trait definitions.

use async_trait::async_trait;

use storyloom_core::{ProviderError, Turn, TurnRole, BEGIN_TRIGGER, OPTIONS_SEPARATOR};

/// Uniform contract over the two backend protocols.
///
/// An adapter is initialised with the system prompt and the transcript the
/// remote side should believe has already happened, then exchanges one player
/// message at a time. Re-initialising replaces all remote state.
#[async_trait]
pub trait ProviderAdapter: Send {
    /// Provider identifier, used in logs and errors.
    fn id(&self) -> &str;

    /// (Re)create the remote conversation state from `seed`.
    async fn initialize(&mut self, system_prompt: &str, seed: &[Turn]) -> Result<(), ProviderError>;

    /// Send one player message and return the model's raw reply text.
    async fn send_turn(&mut self, text: &str) -> Result<String, ProviderError>;
}

/// Author of a seeded message, in provider-neutral terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedRole {
    User,
    Assistant,
}

/// One transcript turn mapped for preloading into a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedMessage {
    pub role: SeedRole,
    pub content: String,
}

/// Map a transcript onto the message sequence the backend originally saw.
///
/// The begin trigger is restored in front of an opening narrator turn, and
/// narrator turns get their options block back so the model keeps seeing the
/// reply format it produced. A narrator turn with no text is dropped together
/// with the message that prompted it.
pub fn seed_messages(seed: &[Turn]) -> Vec<SeedMessage> {
    let mut messages = Vec::with_capacity(seed.len() + 1);

    if seed.first().map_or(false, Turn::is_narrator) {
        messages.push(SeedMessage {
            role: SeedRole::User,
            content: BEGIN_TRIGGER.to_string(),
        });
    }

    for turn in seed {
        match turn.role {
            TurnRole::User => messages.push(SeedMessage {
                role: SeedRole::User,
                content: turn.content.clone(),
            }),
            TurnRole::Narrator => {
                let content = render_narrator(turn);
                if content.trim().is_empty() {
                    if messages.last().map_or(false, |m| m.role == SeedRole::User) {
                        messages.pop();
                    }
                    continue;
                }
                messages.push(SeedMessage {
                    role: SeedRole::Assistant,
                    content,
                });
            }
        }
    }

    messages
}

fn render_narrator(turn: &Turn) -> String {
    if turn.options.is_empty() {
        return turn.content.clone();
    }
    let options: Vec<String> = turn
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", i + 1, option))
        .collect();
    format!("{}\n{}\n{}", turn.content, OPTIONS_SEPARATOR, options.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_core::parse_response;

    #[test]
    fn test_empty_seed() {
        assert!(seed_messages(&[]).is_empty());
    }

    #[test]
    fn test_opening_narrator_gets_trigger() {
        let seed = vec![
            Turn::narrator("Night falls.", vec![], 0),
            Turn::user("Walk", 1),
            Turn::narrator("You walk.", vec![], 2),
        ];
        let messages = seed_messages(&seed);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, SeedRole::User);
        assert_eq!(messages[0].content, BEGIN_TRIGGER);
        assert_eq!(messages[1].role, SeedRole::Assistant);
        assert_eq!(messages[2].role, SeedRole::User);
        assert_eq!(messages[2].content, "Walk");
        assert_eq!(messages[3].role, SeedRole::Assistant);
    }

    #[test]
    fn test_narrator_options_rendered_back() {
        let seed = vec![Turn::narrator(
            "A fork in the road.",
            vec!["Left".into(), "Right".into()],
            0,
        )];
        let messages = seed_messages(&seed);
        let reparsed = parse_response(&messages[1].content);
        assert_eq!(reparsed.narrative, "A fork in the road.");
        assert_eq!(reparsed.options, vec!["Left", "Right"]);
    }

    #[test]
    fn test_empty_narrator_drops_its_pair() {
        let seed = vec![
            Turn::narrator("Night falls.", vec![], 0),
            Turn::user("Shout", 1),
            Turn::narrator("", vec![], 2),
            Turn::user("Whisper", 3),
            Turn::narrator("An echo answers.", vec![], 4),
        ];
        let contents: Vec<String> = seed_messages(&seed).into_iter().map(|m| m.content).collect();
        assert_eq!(
            contents,
            vec![BEGIN_TRIGGER, "Night falls.", "Whisper", "An echo answers."]
        );
    }

    #[test]
    fn test_empty_opening_drops_trigger() {
        let seed = vec![Turn::narrator("", vec![], 0), Turn::user("Look", 1)];
        let messages = seed_messages(&seed);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Look");
    }
}
