//! Story session lifecycle.
//!
//! A [`SessionManager`] owns one conversation: the transcript, the provider
//! binding and the generation counter that invalidates in-flight requests
//! when the session is reset. At most one provider request runs at a time;
//! overlapping calls fail fast with [`Error::Busy`].
//!
//! State lives behind a `parking_lot::Mutex` that is only held between
//! awaits. While a request is pending the adapter is moved out of the
//! binding and owned by that request. Dropping a request future part way
//! (a caller-side timeout or `select!`) is treated as a failed request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use storyloom_core::{
    classify, parse_response, ApiConfig, CharacterProfile, Config, Error, ProviderError, Result,
    SessionSettings, Turn, TurnRole, BEGIN_TRIGGER,
};
use storyloom_providers::{AdapterFactory, ConfiguredAdapterFactory, ProviderAdapter};

use crate::history::{HistoryStore, SceneMarker};
use crate::prompt::build_system_prompt;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No story running
    Uninitialized,
    /// Story running, ready for the next request
    Idle,
    /// Story running, a provider request is in flight
    Pending,
}

/// Owns a single story conversation.
pub struct SessionManager {
    inner: Mutex<Inner>,
    factory: Arc<dyn AdapterFactory>,
    settings: SessionSettings,
    request_timeout: Duration,
}

struct Inner {
    api: ApiConfig,
    generation: u64,
    session: Option<ActiveSession>,
}

struct ActiveSession {
    profile: CharacterProfile,
    system_prompt: String,
    history: HistoryStore,
    binding: Binding,
}

enum Binding {
    Idle {
        adapter: Box<dyn ProviderAdapter>,
        /// False when the last re-initialisation failed or was interrupted
        seeded: bool,
    },
    Pending,
}

/// A request that has left the lock.
struct InFlight {
    adapter: Box<dyn ProviderAdapter>,
    generation: u64,
    system_prompt: String,
    /// Transcript to re-initialise from before sending
    reseed: Option<Vec<Turn>>,
}

struct Outcome {
    adapter: Box<dyn ProviderAdapter>,
    seeded: bool,
    reply: std::result::Result<String, ProviderError>,
}

/// Armed while a request is out of the lock; firing means the request
/// future was dropped before it could hand the adapter back.
struct PendingGuard<'a> {
    manager: &'a SessionManager,
    generation: u64,
    provider: String,
    owes_reply: bool,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(manager: &'a SessionManager, call: &InFlight, owes_reply: bool) -> Self {
        Self {
            manager,
            generation: call.generation,
            provider: call.adapter.id().to_string(),
            owes_reply,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager
                .abandon(self.generation, &self.provider, self.owes_reply);
        }
    }
}

impl Inner {
    fn is_pending(&self) -> bool {
        self.session.as_ref().map_or(false, ActiveSession::is_pending)
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.session = None;
    }

    fn active(&mut self) -> Result<&mut ActiveSession> {
        self.session.as_mut().ok_or(Error::NotStarted)
    }

    /// The session a response belongs to, if it has not been reset since.
    fn current(&mut self, generation: u64) -> Result<&mut ActiveSession> {
        if self.generation != generation {
            warn!(
                generation,
                current = self.generation,
                "Discarding response for a reset session"
            );
            return Err(Error::SessionReset);
        }
        self.session.as_mut().ok_or(Error::SessionReset)
    }
}

impl ActiveSession {
    fn is_pending(&self) -> bool {
        matches!(self.binding, Binding::Pending)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_pending() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn is_seeded(&self) -> bool {
        matches!(self.binding, Binding::Idle { seeded: true, .. })
    }

    /// Move the adapter out, leaving the binding pending.
    fn take_adapter(&mut self) -> Result<Box<dyn ProviderAdapter>> {
        match std::mem::replace(&mut self.binding, Binding::Pending) {
            Binding::Idle { adapter, .. } => Ok(adapter),
            Binding::Pending => Err(Error::Busy),
        }
    }

    fn in_flight(&mut self, generation: u64, reseed: Option<Vec<Turn>>) -> Result<InFlight> {
        let adapter = self.take_adapter()?;
        Ok(InFlight {
            adapter,
            generation,
            system_prompt: self.system_prompt.clone(),
            reseed,
        })
    }
}

impl SessionManager {
    /// Create a builder.
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }

    /// Create a manager wired to the configured backends.
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .api_config(config.api.clone())
            .settings(config.session.clone())
            .factory(Arc::new(ConfiguredAdapterFactory::from_config(config)))
            .build()
    }

    /// Start a new story, discarding any current one.
    ///
    /// Returns the opening narrator turn. A provider failure yields a
    /// failure turn rather than an error.
    pub async fn start_session(&self, profile: CharacterProfile) -> Result<Turn> {
        let call = {
            let mut inner = self.inner.lock();
            if inner.is_pending() {
                return Err(Error::Busy);
            }
            inner.reset();

            let adapter = self.factory.create(&inner.api)?;
            let system_prompt = build_system_prompt(
                &self.settings.system_instruction,
                &profile,
                self.settings.world_notes.as_deref(),
            );
            info!(
                generation = inner.generation,
                provider = adapter.id(),
                character = %profile.name,
                "Starting story"
            );

            inner.session = Some(ActiveSession {
                profile,
                system_prompt: system_prompt.clone(),
                history: HistoryStore::new(),
                binding: Binding::Pending,
            });

            InFlight {
                adapter,
                generation: inner.generation,
                system_prompt,
                reseed: Some(Vec::new()),
            }
        };

        let guard = PendingGuard::new(self, &call, true);
        let generation = call.generation;
        let outcome = self.exchange(call, BEGIN_TRIGGER).await;
        guard.disarm();
        self.complete(generation, outcome)
    }

    /// Send a player action and return the narrator's reply.
    pub async fn send_turn(&self, text: &str) -> Result<Turn> {
        let text = text.trim();

        let call = {
            let mut inner = self.inner.lock();
            let generation = inner.generation;
            let session = inner.active()?;
            session.ensure_idle()?;
            if text.is_empty() {
                return Err(Error::EmptyInput);
            }
            if session.history.expected_role() != TurnRole::User {
                return Err(Error::AwaitingNarrator);
            }

            let reseed = (!session.is_seeded()).then(|| session.history.turns().to_vec());
            session.history.append_user(text)?;
            session.in_flight(generation, reseed)?
        };

        let guard = PendingGuard::new(self, &call, true);
        let generation = call.generation;
        let outcome = self.exchange(call, text).await;
        guard.disarm();
        self.complete(generation, outcome)
    }

    /// Replace the last narrator reply by re-sending the player action that
    /// produced it.
    pub async fn regenerate_last(&self) -> Result<Turn> {
        let (call, text) = {
            let mut inner = self.inner.lock();
            let generation = inner.generation;
            let session = inner.active()?;
            session.ensure_idle()?;

            let (user, _) = session.history.drop_last_pair()?;
            debug!(remaining = session.history.len(), "Regenerating last turn");

            let reseed = Some(session.history.turns().to_vec());
            session.history.append_user(user.content.as_str())?;
            (session.in_flight(generation, reseed)?, user.content)
        };

        let guard = PendingGuard::new(self, &call, true);
        let generation = call.generation;
        let outcome = self.exchange(call, &text).await;
        guard.disarm();
        self.complete(generation, outcome)
    }

    /// Truncate the story to `[0..=index]` and re-seed the provider.
    ///
    /// A failed re-seed is not an error: the binding is marked unseeded and
    /// the next send re-initialises first.
    pub async fn rewind_to(&self, index: usize) -> Result<()> {
        let call = {
            let mut inner = self.inner.lock();
            let generation = inner.generation;
            let session = inner.active()?;
            session.ensure_idle()?;

            session.history.truncate(index)?;
            info!(index, len = session.history.len(), "Rewound story");
            let seed = session.history.turns().to_vec();
            session.in_flight(generation, Some(seed))?
        };

        let guard = PendingGuard::new(self, &call, false);
        let InFlight {
            mut adapter,
            generation,
            system_prompt,
            reseed,
        } = call;
        let seed = reseed.unwrap_or_default();
        let seeded = match self.reseed(&mut *adapter, &system_prompt, &seed).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Re-seeding after rewind failed: {}", e);
                false
            }
        };
        guard.disarm();

        let mut inner = self.inner.lock();
        let session = inner.current(generation)?;
        session.binding = Binding::Idle { adapter, seeded };
        Ok(())
    }

    /// Discard the story. Any in-flight response becomes stale.
    pub fn reset_session(&self) {
        let mut inner = self.inner.lock();
        inner.reset();
        info!(generation = inner.generation, "Session reset");
    }

    /// Replace the API configuration; implies [`Self::reset_session`].
    pub fn update_api_config(&self, api: ApiConfig) {
        let mut inner = self.inner.lock();
        inner.api = api;
        inner.reset();
        info!(
            generation = inner.generation,
            model = %inner.api.model,
            "API configuration updated"
        );
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Vec<Turn> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.history.turns().to_vec())
            .unwrap_or_default()
    }

    /// Scene markers usable as rewind targets.
    pub fn timeline(&self) -> Vec<SceneMarker> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.history.timeline())
            .unwrap_or_default()
    }

    pub fn state(&self) -> SessionState {
        match &self.inner.lock().session {
            None => SessionState::Uninitialized,
            Some(s) if s.is_pending() => SessionState::Pending,
            Some(_) => SessionState::Idle,
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn profile(&self) -> Option<CharacterProfile> {
        self.inner.lock().session.as_ref().map(|s| s.profile.clone())
    }

    pub fn api_config(&self) -> ApiConfig {
        self.inner.lock().api.clone()
    }

    /// Run one provider exchange outside the lock.
    async fn exchange(&self, call: InFlight, text: &str) -> Outcome {
        let InFlight {
            mut adapter,
            system_prompt,
            reseed,
            ..
        } = call;

        if let Some(seed) = reseed {
            if let Err(e) = self.reseed(&mut *adapter, &system_prompt, &seed).await {
                return Outcome {
                    adapter,
                    seeded: false,
                    reply: Err(e),
                };
            }
        }

        let provider = adapter.id().to_string();
        debug!(provider = %provider, "Dispatching turn");
        let reply = self.bounded(&provider, adapter.send_turn(text)).await;

        // An interrupted call may leave the adapter's log half-updated.
        let seeded = !matches!(reply, Err(ProviderError::Timeout { .. }));

        Outcome {
            adapter,
            seeded,
            reply,
        }
    }

    async fn reseed(
        &self,
        adapter: &mut dyn ProviderAdapter,
        system_prompt: &str,
        seed: &[Turn],
    ) -> std::result::Result<(), ProviderError> {
        let provider = adapter.id().to_string();
        debug!(provider = %provider, turns = seed.len(), "Initialising provider");
        self.bounded(&provider, adapter.initialize(system_prompt, seed))
            .await
    }

    async fn bounded<T, F>(&self, provider: &str, call: F) -> std::result::Result<T, ProviderError>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.to_string(),
                seconds: self.request_timeout.as_secs(),
            }),
        }
    }

    /// Recover from a request future dropped mid-flight.
    ///
    /// The adapter went down with the future, so a fresh unseeded one takes
    /// its place. A player turn still waiting for the narrator gets a
    /// failure reply.
    fn abandon(&self, generation: u64, provider: &str, owes_reply: bool) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || !inner.is_pending() {
            return;
        }
        warn!(generation, provider = %provider, "Request cancelled by caller");

        let adapter = match self.factory.create(&inner.api) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!("Could not rebuild provider after cancellation: {}", e);
                inner.reset();
                return;
            }
        };
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        session.binding = Binding::Idle {
            adapter,
            seeded: false,
        };

        if owes_reply && session.history.expected_role() == TurnRole::Narrator {
            let failure = classify(&ProviderError::Cancelled {
                provider: provider.to_string(),
            });
            if let Err(e) = session.history.append_narrator(
                failure.narrative(),
                failure.options(),
                Some(failure.kind),
            ) {
                error!("Could not record cancelled request: {}", e);
            }
        }
    }

    /// Record the outcome of an exchange, unless the session moved on.
    fn complete(&self, generation: u64, outcome: Outcome) -> Result<Turn> {
        let mut inner = self.inner.lock();
        let session = inner.current(generation)?;
        session.binding = Binding::Idle {
            adapter: outcome.adapter,
            seeded: outcome.seeded,
        };

        let turn = match outcome.reply {
            Ok(raw) => {
                let parsed = parse_response(&raw);
                session
                    .history
                    .append_narrator(parsed.narrative, parsed.options, None)?
            }
            Err(e) => {
                error!("Provider request failed: {}", e);
                let failure = classify(&e);
                session.history.append_narrator(
                    failure.narrative(),
                    failure.options(),
                    Some(failure.kind),
                )?
            }
        };
        Ok(turn.clone())
    }
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    api: ApiConfig,
    factory: Option<Arc<dyn AdapterFactory>>,
    settings: SessionSettings,
    request_timeout: Option<Duration>,
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManagerBuilder {
    pub fn new() -> Self {
        Self {
            api: ApiConfig::default(),
            factory: None,
            settings: SessionSettings::default(),
            request_timeout: None,
        }
    }

    /// Set the API configuration used for the next story.
    pub fn api_config(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    /// Set the adapter factory.
    pub fn factory(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set session behaviour (instruction, world notes, timeout).
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Override the per-call deadline from the settings.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> SessionManager {
        let request_timeout = self
            .request_timeout
            .unwrap_or_else(|| self.settings.request_timeout());
        SessionManager {
            inner: Mutex::new(Inner {
                api: self.api,
                generation: 0,
                session: None,
            }),
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(ConfiguredAdapterFactory::default())),
            settings: self.settings,
            request_timeout,
        }
    }
}
