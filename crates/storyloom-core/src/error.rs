//! Error types for Storyloom.
//!
//! Every fallible boundary (adapter calls, configuration, session
//! operations) returns one of these typed errors so callers never have to
//! inspect message strings.

use thiserror::Error;

/// Result type alias using [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Storyloom.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider error with structured details
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Another request is already in flight
    #[error("A request is already in progress")]
    Busy,

    /// No session has been started
    #[error("No active session")]
    NotStarted,

    /// Player input was empty
    #[error("Turn text cannot be empty")]
    EmptyInput,

    /// Rewind target outside the transcript
    #[error("Turn index {index} is out of range (transcript has {len} turns)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Regenerate requested without a user/narrator pair at the end
    #[error("Nothing to regenerate: the transcript must end with a narrator turn answering a user turn")]
    NothingToRegenerate,

    /// The transcript ends with a user turn that has no narrator reply
    #[error("The transcript ends with a player turn; rewind to a narrator turn first")]
    AwaitingNarrator,

    /// The session was reset while the request was in flight
    #[error("The session was reset before the response arrived")]
    SessionReset,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(e) => e.recovery_suggestion(),
            Error::Provider(e) => e.recovery_suggestion(),
            Error::Busy => Some("Wait for the narrator to finish"),
            Error::NotStarted => Some("Start a new story first"),
            Error::IndexOutOfRange { .. } => Some("Use /timeline to see valid turn indices"),
            Error::NothingToRegenerate => Some("Send an action first"),
            Error::AwaitingNarrator => Some("Use /rewind to return to a narrator turn"),
            _ => None,
        }
    }
}

/// Configuration problems detected before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No API key configured and no environment default
    #[error("API key not found")]
    MissingApiKey,

    /// Configuration failed validation
    #[error("{0}")]
    Invalid(String),

    /// Configuration sources could not be read or merged
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingApiKey => {
                Some("Set api.api_key in storyloom.toml or export STORYLOOM_API_KEY")
            }
            ConfigError::Invalid(_) => Some("Run 'storyloom config check' for details"),
            ConfigError::Load(_) => Some("Check the syntax of your storyloom.toml"),
        }
    }
}

/// Provider-specific errors with detailed context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Non-success HTTP status
    #[error("API request to {provider} failed: {status} - {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Transport failure
    #[error("Network error connecting to {provider}: {message}")]
    Network { provider: String, message: String },

    /// Caller-imposed deadline elapsed
    #[error("Request to {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// The caller dropped the request before it finished
    #[error("Request to {provider} was cancelled")]
    Cancelled { provider: String },

    /// Success status but undecodable body
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// `send_turn` called before `initialize`
    #[error("Provider '{provider}' has no active session")]
    NotInitialized { provider: String },
}

impl ProviderError {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ProviderError::Api { status: 401 | 403, .. } => {
                Some("Check that your API key is valid and not expired")
            }
            ProviderError::Api { status: 429, .. } => {
                Some("You've hit rate limits. Wait a moment and try again")
            }
            ProviderError::Api {
                status: 500..=599, ..
            } => Some("The API service is having issues. Try again later"),
            ProviderError::Timeout { .. } => Some("Check your network connection and retry"),
            ProviderError::Network { .. } => Some("Check your internet connection"),
            _ => None,
        }
    }

    /// Create an API error from status code and message.
    pub fn api_error(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ProviderError::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an API error from a failed response body.
    ///
    /// Uses `error.message` when the body is JSON of that shape, otherwise
    /// the raw body text.
    pub fn from_response_body(provider: impl Into<String>, status: u16, body: &str) -> Self {
        Self::api_error(provider, status, extract_error_message(body))
    }

    /// The provider-reported message, without the provider/status prefix.
    pub fn message(&self) -> String {
        match self {
            ProviderError::Api { message, .. }
            | ProviderError::Network { message, .. }
            | ProviderError::InvalidResponse { message, .. } => message.clone(),
            ProviderError::Timeout { seconds, .. } => {
                format!("no response after {seconds}s")
            }
            ProviderError::Cancelled { .. } => "request cancelled before a reply".to_string(),
            ProviderError::NotInitialized { .. } => self.to_string(),
        }
    }

    /// HTTP status, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull `error.message` out of a JSON error body, falling back to the raw text.
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}
