//! Native Gemini adapter.
//!
//! Talks to the Generative Language `generateContent` endpoint through a
//! [`GeminiChat`] handle that carries the system instruction, generation
//! parameters and the conversation history for one story.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use storyloom_core::{NativeSettings, ProviderError, Turn};

use crate::traits::{seed_messages, ProviderAdapter, SeedRole};

const PROVIDER_ID: &str = "gemini";

/// Stateful adapter over a Gemini chat session.
pub struct GeminiAdapter {
    client: Client,
    api_key: String,
    model: String,
    settings: NativeSettings,
    chat: Option<GeminiChat>,
}

impl GeminiAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            settings: NativeSettings::default(),
            chat: None,
        }
    }

    /// Override generation parameters and endpoint.
    pub fn with_settings(mut self, settings: NativeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use a shared HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The current session handle, if initialised.
    pub fn chat(&self) -> Option<&GeminiChat> {
        self.chat.as_ref()
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn initialize(&mut self, system_prompt: &str, seed: &[Turn]) -> Result<(), ProviderError> {
        let mut chat = GeminiChat::new(
            self.client.clone(),
            self.api_key.clone(),
            self.model.clone(),
            system_prompt,
            &self.settings,
        );
        chat.preload(seed);
        debug!(history = chat.history().len(), "Gemini chat created");
        self.chat = Some(chat);
        Ok(())
    }

    #[instrument(skip_all, fields(chars = text.len()))]
    async fn send_turn(&mut self, text: &str) -> Result<String, ProviderError> {
        let chat = self.chat.as_mut().ok_or_else(|| ProviderError::NotInitialized {
            provider: PROVIDER_ID.to_string(),
        })?;
        chat.send_message(text).await
    }
}

/// Opaque conversation handle: request template plus accumulated history.
pub struct GeminiChat {
    client: Client,
    api_key: String,
    url: String,
    system_instruction: Content,
    generation_config: GenerationConfig,
    tools: Vec<Tool>,
    history: Vec<Content>,
}

impl GeminiChat {
    fn new(
        client: Client,
        api_key: String,
        model: String,
        system_prompt: &str,
        settings: &NativeSettings,
    ) -> Self {
        let endpoint = settings.endpoint.trim_end_matches('/');
        let tools = if settings.search {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        Self {
            client,
            api_key,
            url: format!("{endpoint}/models/{model}:generateContent"),
            system_instruction: Content::text(None, system_prompt),
            generation_config: GenerationConfig {
                temperature: settings.temperature,
                max_output_tokens: settings.max_output_tokens,
                thinking_config: ThinkingConfig {
                    thinking_budget: settings.thinking_budget,
                },
            },
            tools,
            history: Vec::new(),
        }
    }

    fn preload(&mut self, seed: &[Turn]) {
        self.history = seed_messages(seed)
            .into_iter()
            .map(|m| {
                let role = match m.role {
                    SeedRole::User => "user",
                    SeedRole::Assistant => "model",
                };
                Content::text(Some(role), m.content)
            })
            .collect();
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Send one user message; history only grows when the call yields text.
    async fn send_message(&mut self, text: &str) -> Result<String, ProviderError> {
        let user = Content::text(Some("user"), text);

        let mut contents = Vec::with_capacity(self.history.len() + 1);
        contents.extend_from_slice(&self.history);
        contents.push(user.clone());

        let request = GenerateContentRequest {
            contents: &contents,
            system_instruction: &self.system_instruction,
            generation_config: &self.generation_config,
            tools: &self.tools,
        };

        debug!(contents = contents.len(), "Gemini generateContent request");

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
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
            error!("Gemini API error: {} - {}", status, body);
            return Err(ProviderError::from_response_body(
                PROVIDER_ID,
                status.as_u16(),
                &body,
            ));
        }

        let body: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;

        let reply = body.text();
        // The API rejects empty text parts, so an empty reply leaves no trace.
        if reply.is_empty() {
            warn!("Gemini returned no text; history left unchanged");
            return Ok(reply);
        }
        self.history.push(user);
        self.history.push(Content::text(Some("model"), reply.as_str()));
        Ok(reply)
    }
}

/// A turn in Gemini's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
                thought: false,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Marks model-internal reasoning, never shown to the player
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thought: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    system_instruction: &'a Content,
    generation_config: &'a GenerationConfig,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [Tool],
}

fn no_tools(tools: &&[Tool]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated non-thought text of the first candidate; empty if none.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}
