//! Minimal Slack Web API client.
//!
//! Only the four methods the bridge needs. Every call is a form POST with
//! the token as bearer auth; Slack reports failures in-band as
//! `{"ok": false, "error": "<code>"}`.

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, de::DeserializeOwned},
    tracing::trace,
};

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

/// `auth.test` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTest {
    pub user_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub team_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub real_name: String,
}

/// `users.info` user object, trimmed to the fields used for display.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub profile: UserProfile,
}

impl User {
    /// Real name, then profile real name, then handle.
    pub fn display_name(&self) -> &str {
        [&self.real_name, &self.profile.real_name]
            .into_iter()
            .find(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

/// `conversations.info` channel object.
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Absent for direct messages.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_im: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RtmSelf {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RtmTeam {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
}

/// `rtm.connect` response: the websocket URL plus who we are.
#[derive(Debug, Clone, Deserialize)]
pub struct RtmConnect {
    pub url: String,
    #[serde(rename = "self")]
    pub self_user: RtmSelf,
    pub team: RtmTeam,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize)]
struct ChannelEnvelope {
    channel: Conversation,
}

/// Web API client bound to one token.
#[derive(Clone)]
pub struct SlackApi {
    http: reqwest::Client,
    base_url: String,
    token: Secret<String>,
}

impl std::fmt::Debug for SlackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApi")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl SlackApi {
    pub fn new(token: Secret<String>) -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_BASE_URL, token)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Secret<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    pub async fn auth_test(&self) -> Result<AuthTest> {
        self.call("auth.test", &[]).await
    }

    pub async fn users_info(&self, user_id: &str) -> Result<User> {
        let envelope: UserEnvelope = self.call("users.info", &[("user", user_id)]).await?;
        Ok(envelope.user)
    }

    pub async fn conversations_info(&self, channel_id: &str) -> Result<Conversation> {
        let envelope: ChannelEnvelope = self
            .call("conversations.info", &[
                ("channel", channel_id),
                ("include_locale", "true"),
            ])
            .await?;
        Ok(envelope.channel)
    }

    pub async fn rtm_connect(&self) -> Result<RtmConnect> {
        self.call("rtm.connect", &[]).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{method}", self.base_url.trim_end_matches('/'));
        trace!(method, "slack api call");
        let resp = self
            .http
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .form(params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::api(method, format!("http status {}", resp.status())));
        }
        parse_response(method, resp.json().await?)
    }
}

fn parse_response<T: DeserializeOwned>(method: &'static str, body: serde_json::Value) -> Result<T> {
    if body.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
        let code = body
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown_error");
        return Err(Error::api(method, code));
    }
    Ok(serde_json::from_value(body)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn api(server: &mockito::Server) -> SlackApi {
        SlackApi::with_client(
            reqwest::Client::new(),
            server.url(),
            Secret::new("xoxp-test".into()),
        )
    }

    #[rstest]
    #[case("Jane Doe", "Jane D.", "jane", "Jane Doe")]
    #[case("", "Jane D.", "jane", "Jane D.")]
    #[case("", "", "jane", "jane")]
    fn display_name_fallbacks(
        #[case] real_name: &str,
        #[case] profile_name: &str,
        #[case] name: &str,
        #[case] want: &str,
    ) {
        let user = User {
            id: "U1".into(),
            name: name.into(),
            real_name: real_name.into(),
            profile: UserProfile {
                real_name: profile_name.into(),
            },
        };
        assert_eq!(user.display_name(), want);
    }

    #[test]
    fn not_ok_maps_to_api_error() {
        let err = parse_response::<AuthTest>("auth.test", json!({"ok": false, "error": "invalid_auth"}))
            .unwrap_err();
        assert!(matches!(err, Error::Api { method: "auth.test", ref error } if error == "invalid_auth"));

        let err = parse_response::<AuthTest>("auth.test", json!({})).unwrap_err();
        assert!(matches!(err, Error::Api { ref error, .. } if error == "unknown_error"));
    }

    #[test]
    fn ok_with_wrong_shape_is_json_error() {
        let err = parse_response::<AuthTest>("auth.test", json!({"ok": true})).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn auth_test_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth.test")
            .match_header("authorization", "Bearer xoxp-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok":true,"user_id":"UBOT","user":"bridge","team":"Acme","team_id":"T1"}"#,
            )
            .create_async()
            .await;

        let auth = api(&server).auth_test().await.unwrap();

        assert_eq!(auth.user_id, "UBOT");
        assert_eq!(auth.team, "Acme");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn users_info_posts_user_param() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users.info")
            .match_body(mockito::Matcher::UrlEncoded("user".into(), "U1".into()))
            .with_status(200)
            .with_body(
                r#"{"ok":true,"user":{"id":"U1","name":"jane","real_name":"","profile":{"real_name":"Jane Doe"}}}"#,
            )
            .create_async()
            .await;

        let user = api(&server).users_info("U1").await.unwrap();

        assert_eq!(user.display_name(), "Jane Doe");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn conversations_info_without_name() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/conversations.info")
            .with_status(200)
            .with_body(r#"{"ok":true,"channel":{"id":"D1","is_im":true,"user":"U1"}}"#)
            .create_async()
            .await;

        let channel = api(&server).conversations_info("D1").await.unwrap();

        assert!(channel.is_im);
        assert_eq!(channel.name, None);
    }

    #[tokio::test]
    async fn api_error_code_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/users.info")
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"user_not_found"}"#)
            .create_async()
            .await;

        let err = api(&server).users_info("U404").await.unwrap_err();

        assert_eq!(err.to_string(), "slack users.info failed: user_not_found");
        assert!(!err.is_auth_failure());
    }

    #[tokio::test]
    async fn http_failure_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rtm.connect")
            .with_status(429)
            .create_async()
            .await;

        let err = api(&server).rtm_connect().await.unwrap_err();

        assert!(matches!(err, Error::Api { method: "rtm.connect", .. }));
    }
}
