//! # storyloom-cli
//!
//! Command-line interface for Storyloom.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storyloom_core::{CharacterProfile, Config};

mod commands;
mod tui;

/// Storyloom - an interactive, branching text adventure narrated by an LLM
#[derive(Parser)]
#[command(name = "storyloom")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Model to use (e.g. gemini-3-pro-preview, deepseek-chat)
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint (switches off the native backend)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// API key (falls back to STORYLOOM_API_KEY, API_KEY, GEMINI_API_KEY)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Character name
    #[arg(long)]
    name: Option<String>,

    /// Character role or occupation
    #[arg(long)]
    role: Option<String>,

    /// Character appearance
    #[arg(long)]
    appearance: Option<String>,

    /// Character background
    #[arg(long)]
    background: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Check,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref model) = self.model {
            config.api.model = model.clone();
        }
        if let Some(ref base_url) = self.base_url {
            config.api.base_url = Some(base_url.clone());
        }
        if let Some(ref api_key) = self.api_key {
            config.api.api_key = api_key.clone();
        }
    }

    /// The player character, with unset fields taken from the default.
    fn profile(&self) -> CharacterProfile {
        let default = CharacterProfile::default();
        CharacterProfile::new(
            self.name.clone().unwrap_or(default.name),
            self.role.clone().unwrap_or(default.role),
            self.appearance.clone().unwrap_or(default.appearance),
            self.background.clone().unwrap_or(default.background),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    cli.apply_overrides(&mut config);

    match cli.command {
        Some(Commands::Config { ref action }) => {
            commands::config::handle(action, &config)?;
        }
        Some(Commands::Version) => {
            println!("storyloom {}", env!("CARGO_PKG_VERSION"));
        }
        None => {
            config.ensure_valid()?;
            tui::run(cli.profile(), config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "storyloom",
            "--model",
            "deepseek-chat",
            "--base-url",
            "https://api.deepseek.com/v1",
            "--api-key",
            "sk-1",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.api.model, "deepseek-chat");
        assert_eq!(config.api.base_url(), Some("https://api.deepseek.com/v1"));
        assert_eq!(config.api.api_key, "sk-1");
    }

    #[test]
    fn test_profile_defaults_fill_gaps() {
        let cli = Cli::parse_from(["storyloom", "--name", "Mei"]);
        let profile = cli.profile();
        assert_eq!(profile.name, "Mei");
        assert_eq!(profile.role, CharacterProfile::default().role);
    }

    #[test]
    fn test_config_subcommand_parses() {
        let cli = Cli::parse_from(["storyloom", "config", "check"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Check
            })
        ));
    }
}
