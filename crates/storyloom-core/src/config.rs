//! Configuration system for Storyloom.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variables consulted, in order, when no API key is configured.
pub const API_KEY_ENV_VARS: &[&str] = &["STORYLOOM_API_KEY", "API_KEY", "GEMINI_API_KEY"];

/// Default model for the native session backend.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Default narrator instruction. The output format section must stay in sync
/// with [`crate::parser::OPTIONS_SEPARATOR`].
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are the narrator of an interactive, branching text adventure. \
Write each scene in the second person, vivid but concise, and stay in character. \
Never describe the player's decisions for them.

Output format:
1. The scene narrative.
2. A line containing exactly ///OPTIONS///
3. Two to four short player choices, one per line, numbered 1., 2., ...";

/// Main configuration struct for Storyloom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend selection and credentials
    pub api: ApiConfig,
    /// Native session backend parameters
    pub native: NativeSettings,
    /// Chat-completions backend parameters
    pub http: HttpSettings,
    /// Session behaviour
    pub session: SessionSettings,
}

/// Selects and parameterises the provider adapter.
///
/// When `base_url` is set the OpenAI-compatible HTTP backend is used,
/// otherwise the native session backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key (empty means "use the environment default")
    pub api_key: String,
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model identifier
    pub model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ApiConfig {
    /// The configured base URL, ignoring blank values.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Resolve the API key from the direct value or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Resolve the API key using a custom environment lookup.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|key| !key.trim().is_empty())
    }

    /// Resolve the API key or fail with [`ConfigError::MissingApiKey`].
    pub fn require_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key().ok_or(ConfigError::MissingApiKey)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeSettings {
    /// Generative Language API root
    pub endpoint: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Token budget for model-internal reasoning
    pub thinking_budget: u32,
    /// Output token ceiling
    pub max_output_tokens: u32,
    /// Let the model ground scenes with web search
    pub search: bool,
}

impl Default for NativeSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.4,
            thinking_budget: 8192,
            max_output_tokens: 20_000,
            search: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Sampling temperature
    pub temperature: f32,
    /// Output token ceiling
    pub max_tokens: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Narrator instruction placed at the top of the system prompt
    pub system_instruction: String,
    /// Extra world-building notes (cast, timeline) appended to the system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_notes: Option<String>,
    /// Upper bound on a single provider call
    pub request_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            world_notes: None,
            request_timeout_secs: 120,
        }
    }
}

impl SessionSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Error).collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Warning).collect()
    }

    /// Add an error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "http.max_tokens")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment(Toml::file("storyloom.toml"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Load configuration with `path` in place of the project file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::figment(Toml::file(path))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    fn figment(project: figment::providers::Data<Toml>) -> Figment {
        Figment::new()
            // Default values
            .merge(Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(Self::config_dir().join("config.toml")))
            // Project config
            .merge(project)
            // Environment variables, e.g. STORYLOOM_API__MODEL
            .merge(Env::prefixed("STORYLOOM_").split("__"))
    }

    /// Load and validate configuration.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Fail on validation errors; log warnings.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let result = self.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(ConfigError::Invalid(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.api.model.trim().is_empty() {
            result.add_error("api.model", "Model name cannot be empty");
        }

        if let Some(base_url) = self.api.base_url() {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                result.add_error("api.base_url", "base_url must start with http:// or https://");
            }
        } else if self.api.base_url.is_some() {
            result.add_warning("api.base_url", "base_url is blank; the native backend will be used");
        }

        if !(0.0..=2.0).contains(&self.native.temperature) {
            result.add_error("native.temperature", "temperature must be between 0.0 and 2.0");
        }

        if self.native.max_output_tokens == 0 {
            result.add_error("native.max_output_tokens", "max_output_tokens must be greater than 0");
        }

        if self.native.thinking_budget >= self.native.max_output_tokens {
            result.add_warning(
                "native.thinking_budget",
                "thinking_budget leaves no room for the scene within max_output_tokens",
            );
        }

        if !(0.0..=2.0).contains(&self.http.temperature) {
            result.add_error("http.temperature", "temperature must be between 0.0 and 2.0");
        }

        if self.http.max_tokens == 0 {
            result.add_error("http.max_tokens", "max_tokens must be greater than 0");
        }

        if self.session.request_timeout_secs == 0 {
            result.add_error("session.request_timeout_secs", "request timeout must be greater than 0");
        }

        if self.session.system_instruction.trim().is_empty() {
            result.add_warning("session.system_instruction", "system instruction is empty");
        }

        result
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("storyloom"))
            .unwrap_or_else(|| PathBuf::from("~/.config/storyloom"))
    }

    /// Render the effective configuration as TOML, with the API key masked.
    pub fn to_toml_masked(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if !shown.api.api_key.is_empty() {
            shown.api.api_key = "********".to_string();
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
