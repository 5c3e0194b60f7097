//! Paced, fire-and-forget delivery on top of a [`Channel`].

use std::sync::Arc;
use std::time::Duration;

use super::channel::{Channel, OutgoingMessage};

/// Sends replies the way a person would type them: a typing indicator,
/// a short pause, then the text. Delivery failures are logged, not returned.
#[derive(Clone)]
pub struct Outbox {
    channel: Arc<dyn Channel>,
    pacing: Duration,
}

impl Outbox {
    pub fn new(channel: Arc<dyn Channel>, pacing: Duration) -> Self {
        Self { channel, pacing }
    }

    /// Pause length before each message.
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Show typing, wait `pause`, then deliver.
    pub async fn say_after(&self, chat_id: &str, message: OutgoingMessage, pause: Duration) {
        if !pause.is_zero() {
            if let Err(e) = self.channel.send_typing(chat_id).await {
                tracing::debug!(chat_id, "Typing indicator failed: {e}");
            }
            tokio::time::sleep(pause).await;
        }
        self.send_now(chat_id, message).await;
    }

    /// Show typing, wait the configured pacing, then deliver.
    pub async fn say(&self, chat_id: &str, message: OutgoingMessage) {
        self.say_after(chat_id, message, self.pacing).await;
    }

    /// Deliver without a typing pause (replies to a broken answer, for instance).
    pub async fn send_now(&self, chat_id: &str, message: OutgoingMessage) {
        if let Err(e) = self.channel.send_text(chat_id, message).await {
            tracing::warn!(chat_id, channel = self.channel.name(), "Failed to deliver message: {e}");
        }
    }
}
