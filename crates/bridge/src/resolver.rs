//! Identity and channel resolution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Error, Result};

/// Resolved channel metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    /// Channel name without `#`. Empty for direct messages.
    pub name: String,
}

/// Directory lookups against the workspace, bound to one token.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Display name for a user id.
    async fn lookup_user(&self, id: &str) -> Result<String>;

    /// Name for a conversation id.
    async fn lookup_channel(&self, id: &str) -> Result<ChannelInfo>;
}

/// Uncached pass-through to a [`Directory`]. Every call may hit the network.
#[derive(Clone)]
pub struct Resolver {
    directory: Arc<dyn Directory>,
}

impl Resolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn resolve_user(&self, id: &str) -> Result<String> {
        self.directory
            .lookup_user(id)
            .await
            .map_err(|e| Error::lookup("user", id, e))
    }

    pub async fn resolve_channel(&self, id: &str) -> Result<ChannelInfo> {
        self.directory
            .lookup_channel(id)
            .await
            .map_err(|e| Error::lookup("channel", id, e))
    }
}
