//! Slash command handling for the REPL.

use storyloom_core::error::format_error_with_suggestion;
use storyloom_core::{CharacterProfile, Config, TurnRole};
use storyloom_session::SessionManager;

use super::print_turn;

/// Result of command execution.
pub enum CommandResult {
    /// Continue the REPL loop
    Continue,
    /// Exit the REPL
    Exit,
    /// An error occurred
    Error(String),
}

/// Handle a slash command.
pub async fn handle_command(
    input: &str,
    manager: &SessionManager,
    config: &Config,
    profile: &CharacterProfile,
) -> CommandResult {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");
    let args = &parts[1..];

    match command {
        "/help" | "/h" | "/?" => {
            print_help();
            CommandResult::Continue
        }
        "/exit" | "/quit" | "/q" => {
            println!("The story pauses here.");
            CommandResult::Exit
        }
        "/regen" => match manager.regenerate_last().await {
            Ok(turn) => {
                print_turn(&turn);
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(format_error_with_suggestion(&e)),
        },
        "/rewind" => handle_rewind(args, manager).await,
        "/timeline" => {
            print_timeline(manager);
            CommandResult::Continue
        }
        "/history" => {
            print_history(manager);
            CommandResult::Continue
        }
        "/reset" => match manager.start_session(profile.clone()).await {
            Ok(turn) => {
                println!("[A new story begins]");
                print_turn(&turn);
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(format_error_with_suggestion(&e)),
        },
        "/config" => match crate::commands::config::show(config) {
            Ok(()) => CommandResult::Continue,
            Err(e) => CommandResult::Error(e.to_string()),
        },
        _ => CommandResult::Error(format!(
            "Unknown command: {}. Type /help for available commands.",
            command
        )),
    }
}

/// Print help information.
fn print_help() {
    println!("Available commands:");
    println!();
    println!("  /help, /h, /?     Show this help message");
    println!("  /quit, /exit, /q  Leave the story");
    println!("  /regen            Ask the narrator to rewrite the last scene");
    println!("  /rewind <index>   Return to a turn; later turns are discarded");
    println!("  /timeline         List scenes and the choices that led to them");
    println!("  /history          Show the full transcript");
    println!("  /reset            Start a new story");
    println!("  /config           Show the active configuration");
    println!();
    println!("Tips:");
    println!("  - Type an option number to pick it, or describe any action");
    println!("  - Use /timeline to find an index for /rewind");
}

async fn handle_rewind(args: &[&str], manager: &SessionManager) -> CommandResult {
    let Some(index) = args.first().and_then(|s| s.parse::<usize>().ok()) else {
        return CommandResult::Error("Usage: /rewind <index>".to_string());
    };

    match manager.rewind_to(index).await {
        Ok(()) => {
            println!("[Rewound to turn {}]", index);
            let transcript = manager.transcript();
            match transcript.last() {
                Some(turn) if turn.role == TurnRole::Narrator => print_turn(turn),
                Some(turn) => {
                    println!("You chose: {}", turn.content);
                    println!("[Use /rewind to pick a scene before acting again]");
                }
                None => {}
            }
            CommandResult::Continue
        }
        Err(e) => CommandResult::Error(format_error_with_suggestion(&e)),
    }
}

fn print_timeline(manager: &SessionManager) {
    let timeline = manager.timeline();
    if timeline.is_empty() {
        println!("No scenes yet.");
        return;
    }
    for marker in timeline {
        match marker.choice {
            Some(choice) => println!("  [{:>3}] ({}) {}", marker.index, choice, marker.summary),
            None => println!("  [{:>3}] {}", marker.index, marker.summary),
        }
    }
}

fn print_history(manager: &SessionManager) {
    for turn in manager.transcript() {
        let label = match turn.role {
            TurnRole::User => "You",
            TurnRole::Narrator => "Narrator",
        };
        println!(
            "[{}] {} ({}):",
            turn.sequence_index,
            label,
            turn.created_at.format("%H:%M:%S")
        );
        println!("{}", turn.content);
        println!();
    }
}
