//! Provider failure classification.
//!
//! Maps raw [`ProviderError`]s onto the small taxonomy the session layer
//! acts on, and renders the narrator turn that stands in for a failed
//! request.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Options attached to every failure turn.
pub const RECOVERY_OPTIONS: [&str; 2] = ["Retry", "Check settings"];

/// Substrings (lowercase) that mark a usage-limit failure.
const QUOTA_MARKERS: &[&str] = &["quota", "resource_exhausted", "resource exhausted"];

/// Kind of provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network or backend hiccup; retrying may succeed
    Transient,
    /// Rate or usage limits were hit
    QuotaExceeded,
}

/// A classified provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    /// Narrative text shown in place of a story scene.
    pub fn narrative(&self) -> String {
        match self.kind {
            FailureKind::QuotaExceeded => {
                "(API quota exhausted. Check your API key or try again later.)".to_string()
            }
            FailureKind::Transient => format!(
                "(System error: lost connection to the storyteller... {})",
                self.message
            ),
        }
    }

    /// Recovery options offered to the player.
    pub fn options(&self) -> Vec<String> {
        RECOVERY_OPTIONS.iter().map(|o| o.to_string()).collect()
    }
}

/// Classify a provider failure.
///
/// HTTP 429 is always [`FailureKind::QuotaExceeded`]; otherwise the message
/// is searched for quota markers. Everything else is transient.
pub fn classify(error: &ProviderError) -> Failure {
    let message = error.message();
    let kind = if error.status() == Some(429) || has_quota_marker(&message) {
        FailureKind::QuotaExceeded
    } else {
        FailureKind::Transient
    };
    Failure { kind, message }
}

fn has_quota_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    QUOTA_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_quota_regardless_of_body() {
        let err = ProviderError::api_error("openai", 429, "please slow down");
        assert_eq!(classify(&err).kind, FailureKind::QuotaExceeded);

        let err = ProviderError::api_error("openai", 429, "");
        assert_eq!(classify(&err).kind, FailureKind::QuotaExceeded);
    }

    #[test]
    fn test_500_with_json_body_is_transient() {
        let err =
            ProviderError::from_response_body("openai", 500, r#"{"error":{"message":"boom"}}"#);
        let failure = classify(&err);
        assert_eq!(failure.kind, FailureKind::Transient);
        assert_eq!(failure.message, "boom");
    }

    #[test]
    fn test_quota_marker_in_message() {
        let err = ProviderError::api_error("gemini", 400, "RESOURCE_EXHAUSTED: try later");
        assert_eq!(classify(&err).kind, FailureKind::QuotaExceeded);

        let err = ProviderError::Network {
            provider: "gemini".into(),
            message: "Quota exceeded for project".into(),
        };
        assert_eq!(classify(&err).kind, FailureKind::QuotaExceeded);
    }

    #[test]
    fn test_cancelled_is_transient() {
        let err = ProviderError::Cancelled {
            provider: "gemini".into(),
        };
        let failure = classify(&err);
        assert_eq!(failure.kind, FailureKind::Transient);
        assert!(failure.narrative().contains("request cancelled"));
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = ProviderError::Timeout {
            provider: "openai".into(),
            seconds: 30,
        };
        let failure = classify(&err);
        assert_eq!(failure.kind, FailureKind::Transient);
        assert!(failure.narrative().contains("30s"));
    }

    #[test]
    fn test_failure_options() {
        let failure = Failure {
            kind: FailureKind::Transient,
            message: "x".into(),
        };
        assert_eq!(failure.options(), vec!["Retry", "Check settings"]);
    }

    #[test]
    fn test_quota_narrative_differs() {
        let quota = Failure {
            kind: FailureKind::QuotaExceeded,
            message: "m".into(),
        };
        let transient = Failure {
            kind: FailureKind::Transient,
            message: "m".into(),
        };
        assert_ne!(quota.narrative(), transient.narrative());
        assert!(quota.narrative().contains("quota"));
    }
}
