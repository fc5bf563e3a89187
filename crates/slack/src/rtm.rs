//! Slack RTM websocket connection manager.
//!
//! `rtm.connect` hands out a one-shot websocket URL. A background task owns
//! the socket: it answers pings, sends RTM keepalives, and forwards parsed
//! frames to the bridge over an mpsc channel. When Slack drops the socket
//! (a `goodbye` frame, a server migration, a network blip) the task asks
//! `auth.test` whether the token still works. A revoked token surfaces as
//! [`InboundEvent::AuthInvalidated`] and ends the stream. Otherwise the task
//! redials with exponential backoff and keeps feeding the same channel, so
//! the bridge never sees the gap.

use std::time::Duration;

use {
    futures::{SinkExt, StreamExt},
    tokio::{
        net::TcpStream,
        sync::{Mutex, mpsc},
        task::JoinHandle,
        time::{Instant, interval_at},
    },
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, trace, warn},
};

use gotify_slack_bridge::{ChatMessage, InboundEvent};

use crate::{
    api::{RtmConnect, SlackApi},
    error::{AUTH_FAILURE_CODES, Error, Result},
};

/// Interval between RTM `ping` frames.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// First delay after a failed redial; doubles up to [`MAX_BACKOFF`].
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

const EVENT_BUFFER: usize = 256;

type RtmSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map one RTM text frame to an event. `None` for frames that are not
/// events (replies to our pings, malformed JSON).
pub fn parse_event(frame: &str) -> Option<InboundEvent> {
    let value: serde_json::Value = serde_json::from_str(frame).ok()?;
    let kind = value.get("type")?.as_str()?;
    let field = |name: &str| value.get(name).and_then(serde_json::Value::as_str);

    let event = match kind {
        "message" => match (field("user"), field("channel")) {
            (Some(user), Some(channel)) => InboundEvent::Message(ChatMessage::new(
                user,
                channel,
                field("text").unwrap_or_default(),
            )),
            _ => {
                let subtype = field("subtype").unwrap_or("unknown");
                InboundEvent::Other(format!("message/{subtype}"))
            },
        },
        "tokens_revoked" => InboundEvent::AuthInvalidated,
        "error" => {
            let msg = value
                .pointer("/error/msg")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            if AUTH_FAILURE_CODES.contains(&msg) {
                InboundEvent::AuthInvalidated
            } else {
                warn!(error = msg, "slack rtm error frame");
                InboundEvent::Other(kind.to_string())
            }
        },
        other => InboundEvent::Other(other.to_string()),
    };
    Some(event)
}

/// Slack is about to close the socket and expects the client to redial.
fn is_goodbye(event: &InboundEvent) -> bool {
    matches!(event, InboundEvent::Other(kind) if kind == "goodbye")
}

/// Delay before the redial that follows `current`.
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// A live RTM connection.
pub struct RtmConnection {
    pub self_id: String,
    pub team: String,
    pub events: mpsc::Receiver<InboundEvent>,
    pub link: RtmLink,
}

/// Teardown handle for the connection-manager task.
pub struct RtmLink {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl RtmLink {
    /// Stop the manager, which sends a close frame. Returns the close error,
    /// if any. Calling it again, or after the manager gave up, succeeds.
    pub async fn disconnect(&self) -> Result<()> {
        self.cancel.cancel();
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) => Err(Error::message(format!("rtm task failed: {e}"))),
        }
    }
}

async fn handshake(api: &SlackApi) -> Result<(RtmSocket, RtmConnect)> {
    let rtm = api.rtm_connect().await?;
    let (ws, _response) = connect_async(rtm.url.as_str()).await?;
    Ok((ws, rtm))
}

/// Perform the handshake and start the connection manager.
pub async fn connect(api: SlackApi) -> Result<RtmConnection> {
    let (ws, rtm) = handshake(&api).await?;
    info!(team = %rtm.team.name, user = %rtm.self_user.name, "slack rtm connected");

    let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(manage(ws, api, event_tx, cancel.clone()));

    Ok(RtmConnection {
        self_id: rtm.self_user.id,
        team: rtm.team.name,
        events,
        link: RtmLink {
            cancel,
            task: Mutex::new(Some(task)),
        },
    })
}

enum Exit {
    /// Cancelled locally; close frame sent.
    Closed,
    /// Remote close, `goodbye`, or read error.
    Dropped,
    /// The bridge stopped listening.
    Abandoned,
}

enum Redial {
    Connected(RtmSocket),
    AuthRevoked,
    Cancelled,
}

async fn manage(
    mut ws: RtmSocket,
    api: SlackApi,
    events: mpsc::Sender<InboundEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        match pump(ws, &events, &cancel).await {
            Ok(Exit::Closed) => {
                debug!("slack rtm socket closed");
                return Ok(());
            },
            Ok(Exit::Abandoned) => return Ok(()),
            Err(e) if cancel.is_cancelled() => return Err(e),
            Ok(Exit::Dropped) => {},
            Err(e) => warn!(error = %e, "slack rtm socket failed"),
        }

        if token_revoked(&api).await {
            let _ = events.send(InboundEvent::AuthInvalidated).await;
            return Ok(());
        }

        ws = match redial(&api, &cancel).await {
            Redial::Connected(ws) => ws,
            Redial::AuthRevoked => {
                let _ = events.send(InboundEvent::AuthInvalidated).await;
                return Ok(());
            },
            Redial::Cancelled => return Ok(()),
        };
    }
}

async fn pump(
    ws: RtmSocket,
    events: &mpsc::Sender<InboundEvent>,
    cancel: &CancellationToken,
) -> Result<Exit> {
    let (mut sink, mut stream) = ws.split();
    let mut keepalive = interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
    let mut ping_id: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sink.send(Message::Close(None)).await?;
                return Ok(Exit::Closed);
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(event) = parse_event(text.as_str()) else {
                        trace!("ignoring non-event rtm frame");
                        continue;
                    };
                    let goodbye = is_goodbye(&event);
                    if events.send(event).await.is_err() {
                        debug!("rtm event receiver dropped");
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(Exit::Abandoned);
                    }
                    if goodbye {
                        debug!("slack said goodbye");
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(Exit::Dropped);
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    sink.send(Message::Pong(data)).await?;
                },
                Some(Ok(Message::Close(_))) | None => {
                    debug!("slack closed the rtm socket");
                    return Ok(Exit::Dropped);
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => return Err(Error::WebSocket(e)),
            },
            _ = keepalive.tick() => {
                ping_id += 1;
                let ping = serde_json::json!({ "id": ping_id, "type": "ping" });
                sink.send(Message::Text(ping.to_string().into())).await?;
            },
        }
    }
}

async fn token_revoked(api: &SlackApi) -> bool {
    match api.auth_test().await {
        Ok(_) => {
            info!("slack rtm socket dropped, token still valid");
            false
        },
        Err(e) if e.is_auth_failure() => {
            warn!(error = %e, "slack rtm socket dropped, token no longer valid");
            true
        },
        Err(e) => {
            warn!(error = %e, "could not re-check slack token after disconnect");
            false
        },
    }
}

/// Redial until a socket opens, the token is rejected, or `cancel` fires.
async fn redial(api: &SlackApi, cancel: &CancellationToken) -> Redial {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Redial::Cancelled,
            attempt = handshake(api) => attempt,
        };
        match attempt {
            Ok((ws, rtm)) => {
                info!(team = %rtm.team.name, "slack rtm reconnected");
                return Redial::Connected(ws);
            },
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "slack rejected the token while reconnecting");
                return Redial::AuthRevoked;
            },
            Err(e) => {
                warn!(error = %e, delay_ms = backoff.as_millis(), "slack rtm reconnect failed");
            },
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Redial::Cancelled,
            _ = tokio::time::sleep(backoff) => {},
        }
        backoff = next_backoff(backoff);
    }
}
