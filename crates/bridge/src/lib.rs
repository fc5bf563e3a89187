//! Slack to Gotify notification bridge.
//!
//! Owns the configuration gate, the plugin lifecycle, and the event loop
//! that turns Slack chat messages into Gotify notifications. The Slack
//! transport and the Gotify client plug in through the [`SlackService`] and
//! [`Notifier`] traits.

pub mod bridge;
pub mod error;
pub mod event;
pub mod mention;
pub mod notify;
pub mod plugin;
pub mod resolver;
pub mod transport;

#[cfg(test)]
mod testing;

pub use {
    bridge::{Bridge, NOTIFICATION_PRIORITY, PLATFORM, build_title},
    error::{Error, Result},
    event::{ChatMessage, InboundEvent, OutboundNotification},
    mention::{UNRESOLVED_MENTION, rewrite_mentions},
    notify::Notifier,
    plugin::{BridgeState, PLUGIN_INFO, PluginInfo, SlackBridgePlugin},
    resolver::{ChannelInfo, Directory, Resolver},
    transport::{BridgeSession, Connection, Link, SlackService},
};
