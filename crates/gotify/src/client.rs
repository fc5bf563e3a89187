use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
    url::Url,
};

use gotify_slack_bridge::{Error as BridgeError, Notifier, OutboundNotification};

use crate::error::{Error, Result};

/// Header carrying the Gotify application token.
pub const TOKEN_HEADER: &str = "X-Gotify-Key";

/// Posts notifications to a Gotify server's `/message` endpoint.
#[derive(Clone)]
pub struct GotifyNotifier {
    http: reqwest::Client,
    endpoint: Url,
    token: Secret<String>,
}

impl std::fmt::Debug for GotifyNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GotifyNotifier")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl GotifyNotifier {
    /// `base_url` may carry a path prefix (`https://host/gotify`).
    pub fn new(base_url: &str, token: Secret<String>) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: base.join("message")?,
            token,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// One delivery attempt. Non-2xx responses are errors.
    pub async fn post(&self, notification: &OutboundNotification) -> Result<()> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .header(TOKEN_HEADER, self.token.expose_secret())
            .json(notification)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        debug!(title = %notification.title, "gotify message created");
        Ok(())
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    async fn send(&self, notification: &OutboundNotification) -> gotify_slack_bridge::Result<()> {
        self.post(notification).await.map_err(BridgeError::notify)
    }
}
