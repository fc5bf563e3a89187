//! Inbound and outbound message types.

/// An event read from the real-time transport, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A user posted a message.
    Message(ChatMessage),
    /// Slack invalidated the session's credentials.
    AuthInvalidated,
    /// Anything else (presence, typing, hello, edits, ...). The payload is
    /// the raw event type, for logging.
    Other(String),
}

/// A chat message as delivered by the transport, before any lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_id: String,
    pub channel_id: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(
        sender_id: impl Into<String>,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            channel_id: channel_id.into(),
            text: text.into(),
        }
    }
}

/// A push notification handed to the outbound notifier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutboundNotification {
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    pub priority: i32,
}
