//! Config schema types for the Slack plugin and its Gotify host.
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub gotify: GotifyConfig,
}

/// Plugin configuration. The Slack token is the only recognized option.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Slack API token (legacy or user token with RTM access).
    #[serde(alias = "slack_token", serialize_with = "serialize_secret")]
    pub token: Secret<String>,
}

impl SlackConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
        }
    }

    /// Whether a credential has been supplied at all.
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().is_empty()
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
        }
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Where notifications are delivered.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GotifyConfig {
    /// Base URL of the Gotify server, e.g. `https://push.example.com`.
    pub url: String,

    /// Application token used as `X-Gotify-Key`.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,
}

impl Default for GotifyConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:80".into(),
            token: Secret::new(String::new()),
        }
    }
}

impl std::fmt::Debug for GotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GotifyConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Copy of `config` with secrets replaced, for display.
#[must_use]
pub fn redacted(config: &AppConfig) -> serde_json::Value {
    let mask = |secret: &Secret<String>| {
        if secret.expose_secret().is_empty() {
            String::new()
        } else {
            "[REDACTED]".to_string()
        }
    };
    serde_json::json!({
        "slack": { "token": mask(&config.slack.token) },
        "gotify": {
            "url": config.gotify.url,
            "token": mask(&config.gotify.token),
        },
    })
}
