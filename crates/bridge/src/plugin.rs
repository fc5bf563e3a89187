//! Plugin lifecycle: configuration gate, enable/disable, status display.
//!
//! All mutations go through one async mutex around [`PluginState`], so a
//! disable can never race a concurrent reconfigure. The streaming loop runs
//! in its own task and reports progress on a watch channel.

use std::sync::Arc;

use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    tokio::{
        sync::{Mutex, watch},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use gotify_slack_config::SlackConfig;

use crate::{
    Error, Result,
    bridge::Bridge,
    notify::Notifier,
    resolver::Resolver,
    transport::{Connection, SlackService},
};

/// Where operators get a token with RTM access.
const TOKEN_HELP_URL: &str = "https://api.slack.com/custom-integrations/legacy-tokens";

/// Failure reason when the transport closes the event stream on its own.
const STREAM_ENDED: &str = "slack event stream ended";

/// Static plugin metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub module_path: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub website: &'static str,
    pub license: &'static str,
    pub version: &'static str,
}

pub const PLUGIN_INFO: PluginInfo = PluginInfo {
    module_path: "github.com/gotify-slack/gotify-slack",
    name: "gotify-slack",
    description: "Slack push notifications for gotify",
    website: "https://github.com/gotify-slack/gotify-slack",
    license: "MIT",
    version: env!("CARGO_PKG_VERSION"),
};

/// Lifecycle of the streaming session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BridgeState {
    Idle,
    Connecting,
    Streaming { team: String },
    Disconnected,
    /// Slack revoked the credentials mid-stream. Needs a fresh enable.
    FatalAuthError,
    /// The handshake failed, or the transport ended the stream on its own.
    Failed { reason: String },
}

impl BridgeState {
    /// No session task is running in this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::FatalAuthError | Self::Failed { .. }
        )
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Streaming { team } => write!(f, "streaming ({team})"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::FatalAuthError => write!(f, "credentials revoked"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

struct SessionHandle {
    token: Secret<String>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl SessionHandle {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the session and wait for it to release the transport.
    async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(Error::external("slack session task failed", e)),
        }
    }
}

#[derive(Default)]
struct PluginState {
    enabled: bool,
    config: Option<SlackConfig>,
    session: Option<SessionHandle>,
}

/// Slack to Gotify bridge plugin. One instance per user context.
pub struct SlackBridgePlugin {
    slack: Arc<dyn SlackService>,
    notifier: Arc<dyn Notifier>,
    inner: Mutex<PluginState>,
    state: Arc<watch::Sender<BridgeState>>,
}

impl SlackBridgePlugin {
    pub fn new(slack: Arc<dyn SlackService>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(BridgeState::Idle);
        Self {
            slack,
            notifier,
            inner: Mutex::new(PluginState::default()),
            state: Arc::new(state),
        }
    }

    pub fn info() -> &'static PluginInfo {
        &PLUGIN_INFO
    }

    pub fn default_config() -> SlackConfig {
        SlackConfig::default()
    }

    /// Current session state.
    pub fn state(&self) -> BridgeState {
        self.state.borrow().clone()
    }

    /// Follow session state changes, e.g. to notice a revoked token.
    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.lock().await.enabled
    }

    pub async fn has_credential(&self) -> bool {
        self.inner.lock().await.config.is_some()
    }

    /// [`Self::set_config`] for hosts that hand over raw JSON.
    pub async fn set_config_value(&self, value: serde_json::Value) -> Result<()> {
        let config: SlackConfig = serde_json::from_value(value)?;
        self.set_config(config).await
    }

    /// Validate and store a new configuration.
    ///
    /// An empty token disables streaming. A token Slack rejects leaves the
    /// previous configuration and session in place. While enabled, a new
    /// token replaces the running session.
    pub async fn set_config(&self, config: SlackConfig) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if !config.has_token() {
            if let Some(session) = inner.session.take()
                && let Err(e) = session.stop().await
            {
                warn!(error = %e, "failed to release slack session while clearing the token");
            }
            inner.config = None;
            info!("slack token cleared");
            return Ok(());
        }

        if !self.slack.validate(&config.token).await {
            return Err(Error::InvalidCredential);
        }

        if !inner.enabled {
            inner.config = Some(config);
            debug!("slack token stored, plugin disabled");
            return Ok(());
        }

        if let Some(session) = inner.session.as_ref()
            && session.is_live()
            && session.token.expose_secret() == config.token.expose_secret()
        {
            debug!("slack token unchanged, keeping session");
            return Ok(());
        }

        let token = config.token.clone();
        inner.config = Some(config);
        if let Some(session) = inner.session.take() {
            session.stop().await?;
        }
        inner.session = Some(self.spawn_session(token));
        info!("slack token replaced, session restarted");
        Ok(())
    }

    /// Start streaming with the stored token. Returns once the session task
    /// is spawned; the handshake happens in the background.
    pub async fn enable(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        let token = inner
            .config
            .as_ref()
            .map(|c| c.token.clone())
            .ok_or(Error::NotConfigured)?;
        if !self.slack.validate(&token).await {
            return Err(Error::InvalidCredential);
        }

        inner.enabled = true;
        if inner.session.as_ref().is_some_and(SessionHandle::is_live) {
            debug!("slack bridge already streaming");
            return Ok(());
        }
        inner.session = Some(self.spawn_session(token));
        info!("slack bridge enabled");
        Ok(())
    }

    /// Stop streaming. A no-op without a session.
    pub async fn disable(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.session.take() {
            session.stop().await?;
        }
        inner.enabled = false;
        info!("slack bridge disabled");
        Ok(())
    }

    /// Markdown status block for the host UI.
    pub async fn status_display(&self) -> String {
        let (enabled, has_token) = {
            let inner = self.inner.lock().await;
            (inner.enabled, inner.config.is_some())
        };
        format!(
            "\n## Status\n\n\
             - Plugin enabled: {enabled}\n\
             - Valid API token: {has_token}\n\
             - Connection: {}\n\n\
             Tip: You can get your API token [here]({TOKEN_HELP_URL}).\n",
            self.state()
        )
    }

    fn spawn_session(&self, token: Secret<String>) -> SessionHandle {
        let cancel = CancellationToken::new();
        self.state.send_replace(BridgeState::Connecting);
        let task = tokio::spawn(run_session(
            Arc::clone(&self.slack),
            Arc::clone(&self.notifier),
            token.clone(),
            cancel.clone(),
            Arc::clone(&self.state),
        ));
        SessionHandle {
            token,
            cancel,
            task,
        }
    }
}

/// Session task body. Returns the transport release result when cancelled;
/// every other outcome is reported through `state` only.
async fn run_session(
    slack: Arc<dyn SlackService>,
    notifier: Arc<dyn Notifier>,
    token: Secret<String>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<BridgeState>>,
) -> Result<()> {
    let connection = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            state.send_replace(BridgeState::Disconnected);
            return Ok(());
        }
        result = slack.connect(&token) => result,
    };

    let Connection {
        session,
        directory,
        mut events,
        link,
    } = match connection {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "slack handshake failed");
            state.send_replace(BridgeState::Failed {
                reason: e.to_string(),
            });
            return Ok(());
        },
    };

    info!(team = %session.team, self_id = %session.self_id, "slack session established");
    state.send_replace(BridgeState::Streaming {
        team: session.team.clone(),
    });

    let bridge = Bridge::new(session, Resolver::new(directory), notifier);
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = bridge.run(&mut events) => Some(result),
    };

    match outcome {
        None => {
            drop(events);
            let released = link.disconnect().await;
            state.send_replace(BridgeState::Disconnected);
            released
        },
        Some(Ok(())) => {
            warn!(team = %bridge.session().team, "slack event stream ended");
            if let Err(e) = link.disconnect().await {
                debug!(error = %e, "releasing dead slack connection failed");
            }
            state.send_replace(BridgeState::Failed {
                reason: STREAM_ENDED.into(),
            });
            Ok(())
        },
        Some(Err(e)) => {
            error!(team = %bridge.session().team, error = %e, "slack bridge stopped");
            if let Err(e) = link.disconnect().await {
                debug!(error = %e, "releasing dead slack connection failed");
            }
            state.send_replace(match e {
                Error::FatalAuth => BridgeState::FatalAuthError,
                other => BridgeState::Failed {
                    reason: other.to_string(),
                },
            });
            Ok(())
        },
    }
}
