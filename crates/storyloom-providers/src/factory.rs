//! Adapter selection.

use reqwest::Client;
use tracing::info;

use storyloom_core::{ApiConfig, Config, ConfigError, HttpSettings, NativeSettings};

use crate::gemini::GeminiAdapter;
use crate::openai::OpenAICompatAdapter;
use crate::traits::ProviderAdapter;

/// Builds the adapter for a new session.
///
/// Called once per story start; the returned adapter lives until the session
/// is reset.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, api: &ApiConfig) -> Result<Box<dyn ProviderAdapter>, ConfigError>;
}

/// Default factory: HTTP adapter when a base URL is configured, native
/// Gemini adapter otherwise.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredAdapterFactory {
    client: Client,
    native: NativeSettings,
    http: HttpSettings,
}

impl ConfiguredAdapterFactory {
    pub fn new(native: NativeSettings, http: HttpSettings) -> Self {
        Self {
            client: Client::new(),
            native,
            http,
        }
    }

    /// Take backend parameters from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.native.clone(), config.http.clone())
    }
}

impl AdapterFactory for ConfiguredAdapterFactory {
    fn create(&self, api: &ApiConfig) -> Result<Box<dyn ProviderAdapter>, ConfigError> {
        let api_key = api.require_api_key()?;

        match api.base_url() {
            Some(base_url) => {
                info!(base_url, model = %api.model, "Using chat-completions backend");
                Ok(Box::new(
                    OpenAICompatAdapter::new(api_key, base_url, api.model.clone())
                        .with_settings(self.http.clone())
                        .with_client(self.client.clone()),
                ))
            }
            None => {
                info!(model = %api.model, "Using native Gemini backend");
                Ok(Box::new(
                    GeminiAdapter::new(api_key, api.model.clone())
                        .with_settings(self.native.clone())
                        .with_client(self.client.clone()),
                ))
            }
        }
    }
}
