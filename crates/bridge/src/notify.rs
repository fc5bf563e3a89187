use async_trait::async_trait;

use crate::{Result, event::OutboundNotification};

/// Delivers notifications to the push service. One attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &OutboundNotification) -> Result<()>;
}
