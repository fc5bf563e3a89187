use thiserror::Error;

/// `error` codes meaning the token itself is no longer usable.
pub const AUTH_FAILURE_CODES: &[&str] = &["invalid_auth", "token_revoked", "account_inactive"];

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Slack answered `{"ok": false, "error": ...}` or a non-2xx status.
    #[error("slack {method} failed: {error}")]
    Api { method: &'static str, error: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn api(method: &'static str, error: impl Into<String>) -> Self {
        Self::Api {
            method,
            error: error.into(),
        }
    }

    /// Whether Slack rejected the token rather than the request.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Api { error, .. } if AUTH_FAILURE_CODES.contains(&error.as_str()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
