//! Gotify push client for the gotify-slack bridge.

pub mod client;
pub mod error;

pub use {
    client::GotifyNotifier,
    error::{Error, Result},
};
