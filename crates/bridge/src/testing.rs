//! In-memory collaborators for unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tokio::sync::mpsc,
};

use crate::{
    Error, Result,
    event::{InboundEvent, OutboundNotification},
    notify::Notifier,
    resolver::{ChannelInfo, Directory},
    transport::{BridgeSession, Connection, Link, SlackService},
};

#[derive(Clone, Default)]
pub struct FakeDirectory {
    users: HashMap<String, String>,
    channels: HashMap<String, String>,
    user_lookups: Arc<AtomicUsize>,
}

impl FakeDirectory {
    pub fn with_user(mut self, id: &str, name: &str) -> Self {
        self.users.insert(id.into(), name.into());
        self
    }

    pub fn with_channel(mut self, id: &str, name: &str) -> Self {
        self.channels.insert(id.into(), name.into());
        self
    }

    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn lookup_user(&self, id: &str) -> Result<String> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(id)
            .cloned()
            .ok_or_else(|| Error::external("users.info", std::io::Error::other("user_not_found")))
    }

    async fn lookup_channel(&self, id: &str) -> Result<ChannelInfo> {
        self.channels
            .get(id)
            .map(|name| ChannelInfo {
                id: id.into(),
                name: name.clone(),
            })
            .ok_or_else(|| {
                Error::external("conversations.info", std::io::Error::other("channel_not_found"))
            })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundNotification>>,
    failures_left: AtomicUsize,
}

impl RecordingNotifier {
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundNotification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &OutboundNotification) -> Result<()> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::notify(std::io::Error::other("gotify unavailable")));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct LinkStats {
    disconnects: AtomicUsize,
    fail: AtomicBool,
}

impl LinkStats {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn fail_disconnects(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

struct FakeLink {
    stats: Arc<LinkStats>,
}

#[async_trait]
impl Link for FakeLink {
    async fn disconnect(&self) -> Result<()> {
        self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.stats.fail.load(Ordering::SeqCst) {
            return Err(Error::disconnect(std::io::Error::other("socket stuck")));
        }
        Ok(())
    }
}

/// Scriptable Slack: tokens in `valid` pass validation, every connect hands
/// the test a sender for the session's event stream.
pub struct FakeSlack {
    valid: Mutex<HashSet<String>>,
    refuse_connect: AtomicBool,
    connects: AtomicUsize,
    senders: Mutex<Vec<mpsc::Sender<InboundEvent>>>,
    pub link: Arc<LinkStats>,
    pub directory: FakeDirectory,
}

impl FakeSlack {
    pub fn new(valid_tokens: &[&str]) -> Self {
        Self {
            valid: Mutex::new(valid_tokens.iter().map(|t| t.to_string()).collect()),
            refuse_connect: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            senders: Mutex::new(Vec::new()),
            link: Arc::new(LinkStats::default()),
            directory: FakeDirectory::default()
                .with_user("U1", "Jane Doe")
                .with_channel("C1", "general"),
        }
    }

    pub fn revoke(&self, token: &str) {
        self.valid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token);
    }

    pub fn refuse_connect(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Close every session's event stream, as a transport that gave up would.
    pub fn end_streams(&self) {
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Event sender of the most recent connection.
    pub fn last_sender(&self) -> Option<mpsc::Sender<InboundEvent>> {
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl SlackService for FakeSlack {
    async fn validate(&self, token: &Secret<String>) -> bool {
        self.valid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(token.expose_secret())
    }

    async fn connect(&self, _token: &Secret<String>) -> Result<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(Error::connect(std::io::Error::other("rtm.connect refused")));
        }
        let (tx, rx) = mpsc::channel(16);
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(Connection {
            session: BridgeSession {
                self_id: "UBOT".into(),
                team: "Acme".into(),
            },
            directory: Arc::new(self.directory.clone()),
            events: rx,
            link: Box::new(FakeLink {
                stats: Arc::clone(&self.link),
            }),
        })
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
