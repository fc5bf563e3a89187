//! Real-time transport seam.
//!
//! The bridge never talks to Slack directly. A [`SlackService`] validates
//! tokens and performs the handshake; the resulting [`Connection`] bundles
//! the event stream, a directory bound to the same token, and a [`Link`]
//! used to tear the connection down.

use std::sync::Arc;

use {async_trait::async_trait, secrecy::Secret, tokio::sync::mpsc};

use crate::{Result, event::InboundEvent, resolver::Directory};

/// Identity of one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSession {
    /// The bridge's own Slack user id, used to drop self-authored messages.
    pub self_id: String,
    /// Workspace (team) display name.
    pub team: String,
}

/// Everything produced by a successful handshake.
pub struct Connection {
    pub session: BridgeSession,
    pub directory: Arc<dyn Directory>,
    pub events: mpsc::Receiver<InboundEvent>,
    pub link: Box<dyn Link>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Token validation and connection establishment.
#[async_trait]
pub trait SlackService: Send + Sync {
    /// Whether Slack accepts `token` (`auth.test`).
    async fn validate(&self, token: &Secret<String>) -> bool;

    /// Perform the real-time handshake. The connection-management task is
    /// already running when this returns.
    async fn connect(&self, token: &Secret<String>) -> Result<Connection>;
}

/// Handle to tear down a live connection.
#[async_trait]
pub trait Link: Send + Sync {
    /// Release the underlying connection. Closing an already closed link
    /// succeeds.
    async fn disconnect(&self) -> Result<()>;
}
