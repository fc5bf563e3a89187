//! Slack transport for the gotify-slack bridge.
//!
//! Talks to the Web API with `reqwest` and streams events over the RTM
//! websocket with `tokio-tungstenite`.

pub mod api;
pub mod error;
pub mod rtm;
pub mod service;

pub use {
    api::SlackApi,
    error::{Error, Result},
    service::{SlackDirectory, SlackRtmService},
};
