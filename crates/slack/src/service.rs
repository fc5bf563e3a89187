//! Bridge collaborator implementations backed by the Slack API.

use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::Secret,
    tracing::{debug, warn},
};

use gotify_slack_bridge::{
    BridgeSession, ChannelInfo, Connection, Directory, Error as BridgeError, Link,
    Result as BridgeResult, SlackService,
};

use crate::{
    api::{DEFAULT_BASE_URL, SlackApi},
    rtm::{self, RtmLink},
};

/// [`SlackService`] over `auth.test` and the RTM websocket.
#[derive(Debug, Clone)]
pub struct SlackRtmService {
    http: reqwest::Client,
    base_url: String,
}

impl Default for SlackRtmService {
    fn default() -> Self {
        Self::new()
    }
}

impl SlackRtmService {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the Web API calls elsewhere, e.g. a mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn api(&self, token: &Secret<String>) -> SlackApi {
        SlackApi::with_client(self.http.clone(), self.base_url.clone(), token.clone())
    }
}

#[async_trait]
impl SlackService for SlackRtmService {
    async fn validate(&self, token: &Secret<String>) -> bool {
        match self.api(token).auth_test().await {
            Ok(auth) => {
                debug!(team = %auth.team, user = %auth.user, "slack token accepted");
                true
            },
            Err(e) => {
                warn!(error = %e, "slack token rejected");
                false
            },
        }
    }

    async fn connect(&self, token: &Secret<String>) -> BridgeResult<Connection> {
        let api = self.api(token);
        let rtm = rtm::connect(api.clone())
            .await
            .map_err(BridgeError::connect)?;

        Ok(Connection {
            session: BridgeSession {
                self_id: rtm.self_id,
                team: rtm.team,
            },
            directory: Arc::new(SlackDirectory::new(api)),
            events: rtm.events,
            link: Box::new(rtm.link),
        })
    }
}

#[async_trait]
impl Link for RtmLink {
    async fn disconnect(&self) -> BridgeResult<()> {
        RtmLink::disconnect(self)
            .await
            .map_err(BridgeError::disconnect)
    }
}

/// [`Directory`] over `users.info` and `conversations.info`. Uncached.
#[derive(Debug, Clone)]
pub struct SlackDirectory {
    api: SlackApi,
}

impl SlackDirectory {
    pub fn new(api: SlackApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Directory for SlackDirectory {
    async fn lookup_user(&self, id: &str) -> BridgeResult<String> {
        let user = self
            .api
            .users_info(id)
            .await
            .map_err(|e| BridgeError::external("users.info", e))?;
        Ok(user.display_name().to_string())
    }

    async fn lookup_channel(&self, id: &str) -> BridgeResult<ChannelInfo> {
        let channel = self
            .api
            .conversations_info(id)
            .await
            .map_err(|e| BridgeError::external("conversations.info", e))?;
        Ok(ChannelInfo {
            id: channel.id,
            name: channel.name.unwrap_or_default(),
        })
    }
}
