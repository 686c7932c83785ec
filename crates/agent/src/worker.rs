//! The interception agent worker task.
//!
//! One detached, single-instance task per client installation, independent
//! of any page session's lifetime. Page sessions talk to it only through
//! [`AgentHandle`]: intercept commands go in over a channel, lifecycle
//! events come back over a broadcast. Nothing holds the agent itself; it
//! runs until `shutdown` or until the last handle is gone.
//!
//! Startup drives the install cycle before any request is served: if the
//! live generation already matches the configured shell version the agent
//! goes straight to active; otherwise a new generation is installed and
//! activated. A failed install with a previously live generation is
//! logged and the old generation keeps serving at its old version — the
//! new version simply never goes live. A failed install with no previous
//! generation is fatal to `spawn`.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use url::Url;

use crate::fetch::{FetchConfig, Fetcher};
use crate::intercept::{InterceptOutcome, InterceptRequest, Interceptor};
use crate::lifecycle::AgentState;
use crate::manifest::{install_shell, shell_document_key};
use gatehouse_core::{AppConfig, CacheDb, Error};

/// Command channel depth; intercepts drain fast (each is re-spawned).
const COMMAND_BUFFER: usize = 64;

/// Agent configuration, derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// The application's own origin; manifest entries resolve against it.
    pub origin: Url,
    /// Shell version this agent build expects to have live.
    pub shell_version: i64,
    /// Hosts bypassed by interception (the live database/API).
    pub api_hosts: Vec<String>,
    /// Outbound fetch settings.
    pub fetch: FetchConfig,
}

impl AgentConfig {
    /// Derive the agent configuration from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the configured origin does not parse.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            shell_version: config.shell_version,
            api_hosts: config.api_hosts.clone(),
            fetch: FetchConfig {
                user_agent: config.user_agent.clone(),
                max_bytes: config.max_bytes,
                timeout: config.timeout(),
            },
        })
    }
}

/// Lifecycle events broadcast to page sessions.
///
/// Sessions that subscribe before the agent spawns observe activation as
/// it happens — the claim of in-flight sessions — instead of waiting for
/// their next natural reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A new generation went live.
    Activated { version: i64 },
    /// Open page sessions are now controlled by this agent version.
    ClientsClaimed,
}

enum AgentCommand {
    Intercept { request: InterceptRequest, reply: oneshot::Sender<InterceptOutcome> },
    State { reply: oneshot::Sender<AgentState> },
    Shutdown,
}

/// Cheap, cloneable handle to the agent task.
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::Sender<AgentCommand>,
    events: broadcast::Sender<AgentEvent>,
}

impl AgentHandle {
    /// Run one request through the agent.
    ///
    /// # Errors
    ///
    /// Returns `Error::AgentUnavailable` if the agent task has stopped.
    pub async fn intercept(&self, request: InterceptRequest) -> Result<InterceptOutcome, Error> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(AgentCommand::Intercept { request, reply: tx })
            .await
            .map_err(|_| Error::AgentUnavailable)?;
        rx.await.map_err(|_| Error::AgentUnavailable)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> Result<AgentState, Error> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(AgentCommand::State { reply: tx })
            .await
            .map_err(|_| Error::AgentUnavailable)?;
        rx.await.map_err(|_| Error::AgentUnavailable)
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Stop the agent task. In-flight intercepts complete on their own
    /// tasks; queued commands are dropped.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(AgentCommand::Shutdown).await;
    }
}

/// The interception agent.
pub struct Agent;

impl Agent {
    /// Start the agent: run the install/activate cycle, then serve.
    ///
    /// `events` is the broadcast channel page sessions subscribe to; create
    /// it with [`Agent::events_channel`] and subscribe sessions *before*
    /// spawning so activation claims them immediately.
    ///
    /// # Errors
    ///
    /// Fails if the store is unreachable, the origin is unusable, or the
    /// shell install fails with no previously live generation to fall
    /// back on.
    pub async fn spawn(
        config: AgentConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>, events: broadcast::Sender<AgentEvent>,
    ) -> Result<AgentHandle, Error> {
        let previous = db.live_generation().await?;

        let serving_version = match &previous {
            Some(live) if live.version >= config.shell_version => {
                tracing::debug!(version = live.version, "shell generation already current");
                live.version
            }
            _ => match Self::install_and_activate(&config, &db, fetcher.as_ref(), &events).await {
                Ok(version) => version,
                Err(e) => match &previous {
                    Some(live) => {
                        tracing::warn!(
                            error = %e,
                            version = live.version,
                            "shell install failed; previous generation keeps serving"
                        );
                        live.version
                    }
                    None => return Err(e),
                },
            },
        };

        let shell_key = shell_document_key(&config.origin)?;
        let interceptor = Interceptor::new(db, fetcher, config.api_hosts.clone(), shell_key);

        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(run(command_rx, interceptor));

        tracing::info!(version = serving_version, "interception agent active");
        Ok(AgentHandle { commands, events })
    }

    /// Create the lifecycle event channel page sessions subscribe to.
    pub fn events_channel() -> broadcast::Sender<AgentEvent> {
        broadcast::channel(16).0
    }

    async fn install_and_activate(
        config: &AgentConfig, db: &CacheDb, fetcher: &dyn Fetcher, events: &broadcast::Sender<AgentEvent>,
    ) -> Result<i64, Error> {
        let state = AgentState::Installing;
        tracing::info!(version = config.shell_version, "installing shell generation");

        let generation = db.create_generation(config.shell_version).await?;
        install_shell(db, fetcher, &config.origin, &generation).await?;
        let state = state.advance(AgentState::Installed)?;

        let state = state.advance(AgentState::Activating)?;
        let deleted = db.activate_generation(generation.version).await?;
        if deleted > 0 {
            tracing::debug!(deleted, "superseded generations removed");
        }

        state.advance(AgentState::Active)?;
        let _ = events.send(AgentEvent::Activated { version: generation.version });
        let _ = events.send(AgentEvent::ClientsClaimed);

        Ok(generation.version)
    }
}

/// The agent's message loop. Every intercept runs on its own task so
/// concurrent requests proceed in parallel; requests to the same key each
/// independently check-then-fetch-then-store.
async fn run(mut commands: mpsc::Receiver<AgentCommand>, interceptor: Interceptor) {
    while let Some(command) = commands.recv().await {
        match command {
            AgentCommand::Intercept { request, reply } => {
                let interceptor = interceptor.clone();
                tokio::spawn(async move {
                    let outcome = interceptor.handle(&request).await;
                    let _ = reply.send(outcome);
                });
            }
            AgentCommand::State { reply } => {
                let _ = reply.send(AgentState::Active);
            }
            AgentCommand::Shutdown => break,
        }
    }
    tracing::debug!("interception agent stopped");
}
