//! OpenAI-compatible chat-completions adapter.
//!
//! Works against any endpoint speaking the `/chat/completions` dialect
//! (DeepSeek, OpenRouter, local gateways). The server keeps no state, so the
//! whole conversation is re-sent on every turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use storyloom_core::{HttpSettings, ProviderError, Turn};

use crate::traits::{seed_messages, ProviderAdapter, SeedRole};

const PROVIDER_ID: &str = "openai-compat";

/// Stateless HTTP adapter holding an explicit message log.
pub struct OpenAICompatAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    settings: HttpSettings,
    messages: Vec<ChatMessage>,
}

impl OpenAICompatAdapter {
    /// Create a new adapter. Trailing slashes on `base_url` are dropped.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl AsRef<str>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: normalize_base_url(base_url.as_ref()),
            model: model.into(),
            settings: HttpSettings::default(),
            messages: Vec::new(),
        }
    }

    /// Override sampling parameters.
    pub fn with_settings(mut self, settings: HttpSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use a shared HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The message log as it will be sent, system prompt first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post_log(&self) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: &self.messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        debug!(messages = self.messages.len(), "Sending chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat completion error: {} - {}", status, body);
            return Err(ProviderError::from_response_body(
                PROVIDER_ID,
                status.as_u16(),
                &body,
            ));
        }

        let body: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAICompatAdapter {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn initialize(&mut self, system_prompt: &str, seed: &[Turn]) -> Result<(), ProviderError> {
        let mut messages = Vec::with_capacity(seed.len() + 2);
        messages.push(ChatMessage::new("system", system_prompt));
        messages.extend(seed_messages(seed).into_iter().map(|m| {
            let role = match m.role {
                SeedRole::User => "user",
                SeedRole::Assistant => "assistant",
            };
            ChatMessage::new(role, m.content)
        }));
        debug!(seeded = messages.len() - 1, "Message log initialised");
        self.messages = messages;
        Ok(())
    }

    #[instrument(skip_all, fields(chars = text.len()))]
    async fn send_turn(&mut self, text: &str) -> Result<String, ProviderError> {
        if self.messages.is_empty() {
            return Err(ProviderError::NotInitialized {
                provider: PROVIDER_ID.to_string(),
            });
        }

        self.messages.push(ChatMessage::new("user", text));

        match self.post_log().await {
            Ok(reply) if !reply.is_empty() => {
                self.messages.push(ChatMessage::new("assistant", reply.as_str()));
                Ok(reply)
            }
            // Failed or empty exchanges are rolled back so the log keeps alternating.
            result => {
                self.messages.pop();
                result
            }
        }
    }
}

/// Strip trailing slashes so `{base}/chat/completions` never doubles up.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// One entry of the chat-completions message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
