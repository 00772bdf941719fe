//! Terminal UI for interactive mode.
//!
//! A readline-style REPL over a [`SessionManager`]: scenes are printed with
//! numbered options, and the player answers with free text or a number.

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use storyloom_core::error::format_error_with_suggestion;
use storyloom_core::{CharacterProfile, Config, Error, Turn, RECOVERY_OPTIONS};
use storyloom_session::SessionManager;

mod commands;

/// What a line of player input asks for.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Send(String),
    Retry,
    ShowSettings,
}

/// Run the interactive REPL.
pub async fn run(profile: CharacterProfile, config: Config) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(&config);

    print_welcome_banner(&config, &profile);

    // Initialize readline editor
    let mut editor = DefaultEditor::new()?;

    let history_path = get_history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
    }

    match manager.start_session(profile.clone()).await {
        Ok(turn) => print_turn(&turn),
        Err(e) => anyhow::bail!(format_error_with_suggestion(&e)),
    }

    // Main REPL loop
    loop {
        match editor.readline("\n> ") {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                let _ = editor.add_history_entry(line);

                if line.starts_with('/') {
                    match commands::handle_command(line, &manager, &config, &profile).await {
                        commands::CommandResult::Continue => continue,
                        commands::CommandResult::Exit => break,
                        commands::CommandResult::Error(e) => {
                            eprintln!("Error: {}", e);
                            continue;
                        }
                    }
                }

                let transcript = manager.transcript();
                let result = match interpret(line, transcript.last()) {
                    Action::Send(text) => manager.send_turn(&text).await,
                    Action::Retry => retry(&manager, &profile, transcript.len()).await,
                    Action::ShowSettings => {
                        if let Err(e) = crate::commands::config::show(&config) {
                            eprintln!("Error: {}", e);
                        }
                        continue;
                    }
                };
                report(result);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nThe story pauses here.");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = editor.save_history(&history_path);

    Ok(())
}

/// Map input onto an action, resolving option numbers against `last`.
fn interpret(input: &str, last: Option<&Turn>) -> Action {
    let options = last
        .filter(|turn| turn.is_narrator())
        .map(|turn| turn.options.as_slice())
        .unwrap_or_default();

    let choice = input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| options.get(i))
        .map(String::as_str)
        .unwrap_or(input);

    if last.map_or(false, Turn::is_failure) {
        if choice == RECOVERY_OPTIONS[0] {
            return Action::Retry;
        }
        if choice == RECOVERY_OPTIONS[1] {
            return Action::ShowSettings;
        }
    }
    Action::Send(choice.to_string())
}

/// Re-run the failed request: regenerate, or restart when the opening failed.
async fn retry(
    manager: &SessionManager,
    profile: &CharacterProfile,
    transcript_len: usize,
) -> Result<Turn, Error> {
    if transcript_len <= 1 {
        manager.start_session(profile.clone()).await
    } else {
        manager.regenerate_last().await
    }
}

fn report(result: Result<Turn, Error>) {
    match result {
        Ok(turn) => print_turn(&turn),
        Err(e) => eprintln!("Error: {}", format_error_with_suggestion(&e)),
    }
}

/// Print a narrator turn with its numbered options.
fn print_turn(turn: &Turn) {
    println!();
    println!("{}", turn.content);
    if !turn.options.is_empty() {
        println!();
        for (i, option) in turn.options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
    }
}

/// Print the welcome banner.
fn print_welcome_banner(config: &Config, profile: &CharacterProfile) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!(
        "║  storyloom v{:<49}║",
        env!("CARGO_PKG_VERSION")
    );
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Type an action or an option number. /help for commands.     ║");
    println!("║  Press Ctrl+D to exit.                                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let backend = if config.api.base_url().is_some() {
        "chat-completions"
    } else {
        "native"
    };
    println!("[Backend: {} | Model: {}]", backend, config.api.model);
    println!("[Playing as {}, {}]", profile.name, profile.role);
}

/// Get the path to the history file.
fn get_history_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storyloom")
        .join("history.txt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_core::FailureKind;

    fn scene(options: &[&str]) -> Turn {
        Turn::narrator("Scene", options.iter().map(|o| o.to_string()).collect(), 0)
    }

    #[test]
    fn test_number_selects_option() {
        let last = scene(&["Open the door", "Walk away"]);
        assert_eq!(
            interpret("2", Some(&last)),
            Action::Send("Walk away".to_string())
        );
    }

    #[test]
    fn test_out_of_range_number_is_free_text() {
        let last = scene(&["Open the door"]);
        assert_eq!(interpret("0", Some(&last)), Action::Send("0".to_string()));
        assert_eq!(interpret("7", Some(&last)), Action::Send("7".to_string()));
    }

    #[test]
    fn test_recovery_options_on_failure_turn() {
        let last = Turn::narrator(
            "(System error)",
            RECOVERY_OPTIONS.iter().map(|o| o.to_string()).collect(),
            2,
        )
        .with_failure(FailureKind::Transient);

        assert_eq!(interpret("1", Some(&last)), Action::Retry);
        assert_eq!(interpret("2", Some(&last)), Action::ShowSettings);
        assert_eq!(interpret("Retry", Some(&last)), Action::Retry);
    }

    #[test]
    fn test_retry_text_on_normal_turn_is_sent() {
        let last = scene(&["Retry"]);
        assert_eq!(interpret("1", Some(&last)), Action::Send("Retry".to_string()));
    }
}
