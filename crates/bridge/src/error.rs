use std::error::Error as StdError;

/// Crate-wide result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors surfaced by the bridge and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No Slack token has been stored yet.
    #[error("please configure the slack api token first")]
    NotConfigured,

    /// The token failed `auth.test`, at config time or when (re)starting.
    #[error("the slack api token is invalid")]
    InvalidCredential,

    /// Slack revoked the session's credentials while streaming.
    #[error("invalid credentials")]
    FatalAuth,

    /// A user or channel could not be resolved for a single event.
    #[error("failed to look up {kind} {id}: {source}")]
    Lookup {
        kind: &'static str,
        id: String,
        #[source]
        source: BoxError,
    },

    /// The real-time handshake failed.
    #[error("failed to connect to slack: {source}")]
    Connect {
        #[source]
        source: BoxError,
    },

    /// Releasing the real-time connection failed.
    #[error("failed to disconnect from slack: {source}")]
    Disconnect {
        #[source]
        source: BoxError,
    },

    /// The outbound notifier rejected a notification.
    #[error("failed to deliver notification: {source}")]
    Notify {
        #[source]
        source: BoxError,
    },

    /// Wrapped source error from an external dependency.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: BoxError,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn lookup(
        kind: &'static str,
        id: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Lookup {
            kind,
            id: id.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn connect(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Connect {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn disconnect(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Disconnect {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn notify(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Notify {
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
