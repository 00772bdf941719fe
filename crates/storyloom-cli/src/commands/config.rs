//! Configuration management commands.

use storyloom_core::config::IssueSeverity;
use storyloom_core::Config;

use crate::ConfigAction;

pub fn handle(action: &ConfigAction, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => show(config),
        ConfigAction::Check => check(config),
    }
}

/// Print the effective configuration with the API key masked.
pub fn show(config: &Config) -> anyhow::Result<()> {
    println!("# Effective configuration");
    println!(
        "# Sources: defaults, {}, ./storyloom.toml, STORYLOOM_* environment",
        Config::config_dir().join("config.toml").display()
    );
    println!();
    println!("{}", config.to_toml_masked()?);
    Ok(())
}

/// Print a validation report; fails when there are errors.
pub fn check(config: &Config) -> anyhow::Result<()> {
    let backend = match config.api.base_url() {
        Some(url) => format!("chat-completions ({})", url),
        None => format!("native ({})", config.native.endpoint),
    };
    println!("Backend: {}", backend);
    println!("Model:   {}", config.api.model);
    println!(
        "API key: {}",
        if config.api.resolve_api_key().is_some() {
            "found"
        } else {
            "missing"
        }
    );
    println!();

    let result = config.validate();
    if result.issues.is_empty() {
        println!("Configuration OK");
        return Ok(());
    }

    for issue in &result.issues {
        let label = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        println!("  [{}] {}: {}", label, issue.field, issue.message);
    }

    if !result.is_ok() {
        anyhow::bail!("{} configuration error(s)", result.errors().len());
    }
    Ok(())
}
