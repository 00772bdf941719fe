//! System prompt assembly.

use storyloom_core::CharacterProfile;

/// Build the system prompt sent on every provider (re)initialisation.
///
/// Layout: narrator instruction, the player character block, then optional
/// world notes.
pub fn build_system_prompt(
    instruction: &str,
    profile: &CharacterProfile,
    world_notes: Option<&str>,
) -> String {
    let mut prompt = String::new();

    let instruction = instruction.trim();
    if !instruction.is_empty() {
        prompt.push_str(instruction);
        prompt.push_str("\n\n");
    }

    prompt.push_str("[Player character]\n");
    prompt.push_str(&format!("Name: {}\n", profile.name.trim()));
    prompt.push_str(&format!("Role: {}\n", profile.role.trim()));
    prompt.push_str(&format!("Appearance: {}\n", profile.appearance.trim()));
    prompt.push_str(&format!("Background: {}", profile.background.trim()));

    if let Some(notes) = world_notes.map(str::trim).filter(|n| !n.is_empty()) {
        prompt.push_str("\n\n[World notes]\n");
        prompt.push_str(notes);
    }

    prompt
}
