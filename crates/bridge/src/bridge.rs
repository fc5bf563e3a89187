//! The event bridge loop.
//!
//! Consumes inbound events one at a time, in arrival order, and turns each
//! qualifying chat message into a Gotify notification.

use std::sync::Arc;

use {
    tokio::sync::mpsc,
    tracing::{debug, error, info, trace, warn},
};

use crate::{
    Error, Result,
    event::{ChatMessage, InboundEvent, OutboundNotification},
    mention::rewrite_mentions,
    notify::Notifier,
    resolver::Resolver,
    transport::BridgeSession,
};

/// Platform label leading every notification title.
pub const PLATFORM: &str = "Slack";

/// Priority of every forwarded message.
pub const NOTIFICATION_PRIORITY: i32 = 5;

/// `"Slack | <team> | [<channel> | ]<sender>"`. The channel segment is
/// omitted when the conversation has no name (direct messages).
pub fn build_title(team: &str, channel: &str, sender: &str) -> String {
    let mut title = format!("{PLATFORM} | {team} | ");
    if !channel.is_empty() {
        title.push_str(channel);
        title.push_str(" | ");
    }
    title.push_str(sender);
    title
}

/// One streaming session's worth of bridging state.
pub struct Bridge {
    session: BridgeSession,
    resolver: Resolver,
    notifier: Arc<dyn Notifier>,
}

impl Bridge {
    pub fn new(session: BridgeSession, resolver: Resolver, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            session,
            resolver,
            notifier,
        }
    }

    pub fn session(&self) -> &BridgeSession {
        &self.session
    }

    /// Run until the stream ends (`Ok`) or Slack invalidates the
    /// credentials ([`Error::FatalAuth`]). Per-event failures are logged and
    /// never end the loop.
    pub async fn run(&self, events: &mut mpsc::Receiver<InboundEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            match event {
                InboundEvent::Message(msg) => self.forward(&msg).await,
                InboundEvent::AuthInvalidated => {
                    error!(team = %self.session.team, "slack invalidated the credentials");
                    return Err(Error::FatalAuth);
                },
                InboundEvent::Other(kind) => {
                    trace!(kind = %kind, "ignoring slack event");
                },
            }
        }
        info!(team = %self.session.team, "slack event stream ended");
        Ok(())
    }

    async fn forward(&self, msg: &ChatMessage) {
        let notification = match self.transform(msg).await {
            Ok(Some(notification)) => notification,
            Ok(None) => return,
            Err(e) => {
                warn!(
                    channel_id = %msg.channel_id,
                    sender_id = %msg.sender_id,
                    error = %e,
                    "dropping slack message"
                );
                return;
            },
        };

        if let Err(e) = self.notifier.send(&notification).await {
            warn!(title = %notification.title, error = %e, "failed to send notification");
        } else {
            debug!(title = %notification.title, "notification sent");
        }
    }

    /// Build the notification for `msg`, or `None` when the bridge itself
    /// authored it.
    pub async fn transform(&self, msg: &ChatMessage) -> Result<Option<OutboundNotification>> {
        if msg.sender_id == self.session.self_id {
            return Ok(None);
        }

        let channel = self.resolver.resolve_channel(&msg.channel_id).await?;
        let sender = self.resolver.resolve_user(&msg.sender_id).await?;
        let body = rewrite_mentions(&msg.text, &self.resolver).await;

        Ok(Some(OutboundNotification {
            title: build_title(&self.session.team, &channel.name, &sender),
            body,
            priority: NOTIFICATION_PRIORITY,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::testing::{FakeDirectory, RecordingNotifier},
        rstest::rstest,
    };

    fn session() -> BridgeSession {
        BridgeSession {
            self_id: "UBOT".into(),
            team: "Acme".into(),
        }
    }

    fn directory() -> FakeDirectory {
        FakeDirectory::default()
            .with_user("U1", "Jane Doe")
            .with_user("U123", "Alice")
            .with_user("UBOT", "Bridge")
            .with_channel("C1", "general")
            .with_channel("D1", "")
    }

    fn bridge(directory: FakeDirectory, notifier: Arc<RecordingNotifier>) -> Bridge {
        Bridge::new(session(), Resolver::new(Arc::new(directory)), notifier)
    }

    async fn run_with(
        bridge: &Bridge,
        events: Vec<InboundEvent>,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);
        bridge.run(&mut rx).await
    }

    #[rstest]
    #[case("Acme", "general", "Jane Doe", "Slack | Acme | general | Jane Doe")]
    #[case("Acme", "", "Jane Doe", "Slack | Acme | Jane Doe")]
    #[case("", "", "", "Slack |  | ")]
    fn title(#[case] team: &str, #[case] channel: &str, #[case] sender: &str, #[case] want: &str) {
        assert_eq!(build_title(team, channel, sender), want);
    }

    #[tokio::test]
    async fn forwards_channel_message() {
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = bridge(directory(), Arc::clone(&notifier));

        run_with(&bridge, vec![InboundEvent::Message(ChatMessage::new(
            "U1",
            "C1",
            "hello <@U123> and <@U456>",
        ))])
        .await
        .unwrap();

        assert_eq!(notifier.sent(), vec![OutboundNotification {
            title: "Slack | Acme | general | Jane Doe".into(),
            body: "hello @Alice and @Error".into(),
            priority: 5,
        }]);
    }

    #[tokio::test]
    async fn direct_message_omits_channel_segment() {
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = bridge(directory(), Arc::clone(&notifier));

        let out = bridge
            .transform(&ChatMessage::new("U1", "D1", "psst"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.title, "Slack | Acme | Jane Doe");
        assert_eq!(out.body, "psst");
    }

    #[rstest]
    #[case("C1", "anything")]
    #[case("D1", "<@U1>")]
    #[case("C404", "")]
    #[tokio::test]
    async fn self_messages_never_notify(#[case] channel: &str, #[case] text: &str) {
        let notifier = Arc::new(RecordingNotifier::default());
        let directory = directory();
        let bridge = Bridge::new(
            session(),
            Resolver::new(Arc::new(directory.clone())),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );

        run_with(&bridge, vec![InboundEvent::Message(ChatMessage::new(
            "UBOT", channel, text,
        ))])
        .await
        .unwrap();

        assert!(notifier.sent().is_empty());
        assert_eq!(directory.user_lookups(), 0);
    }

    #[tokio::test]
    async fn lookup_failure_drops_only_that_event() {
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = bridge(directory(), Arc::clone(&notifier));

        run_with(&bridge, vec![
            InboundEvent::Message(ChatMessage::new("U1", "C404", "lost")),
            InboundEvent::Message(ChatMessage::new("U404", "C1", "lost too")),
            InboundEvent::Message(ChatMessage::new("U1", "C1", "kept")),
        ])
        .await
        .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "kept");
    }

    #[tokio::test]
    async fn notifier_failure_does_not_stop_loop() {
        let notifier = Arc::new(RecordingNotifier::failing_first(1));
        let bridge = bridge(directory(), Arc::clone(&notifier));

        run_with(&bridge, vec![
            InboundEvent::Message(ChatMessage::new("U1", "C1", "first")),
            InboundEvent::Message(ChatMessage::new("U1", "C1", "second")),
        ])
        .await
        .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "second");
    }

    #[tokio::test]
    async fn auth_invalidated_terminates_loop() {
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = bridge(directory(), Arc::clone(&notifier));

        let result = run_with(&bridge, vec![
            InboundEvent::Message(ChatMessage::new("U1", "C1", "before")),
            InboundEvent::AuthInvalidated,
            InboundEvent::Message(ChatMessage::new("U1", "C1", "after")),
        ])
        .await;

        assert!(matches!(result, Err(Error::FatalAuth)));
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "before");
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = bridge(directory(), Arc::clone(&notifier));

        run_with(&bridge, vec![
            InboundEvent::Other("hello".into()),
            InboundEvent::Other("user_typing".into()),
            InboundEvent::Message(ChatMessage::new("U1", "C1", "hi")),
        ])
        .await
        .unwrap();

        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn events_are_processed_in_order() {
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = bridge(directory(), Arc::clone(&notifier));

        let events = (0..5)
            .map(|i| InboundEvent::Message(ChatMessage::new("U1", "C1", format!("m{i}"))))
            .collect();
        run_with(&bridge, events).await.unwrap();

        let bodies: Vec<String> = notifier.sent().into_iter().map(|n| n.body).collect();
        assert_eq!(bodies, vec!["m0", "m1", "m2", "m3", "m4"]);
    }
}
