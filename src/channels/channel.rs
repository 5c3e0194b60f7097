//! The `Channel` trait and the message types that flow through it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::ChannelError;

/// A text event received from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Name of the channel that produced the message.
    pub channel: String,
    /// Stable sender identity.
    pub user_id: String,
    /// Where replies go. Equals `user_id` in private chats.
    pub chat_id: String,
    /// Public alias (e.g. Telegram username), if the sender has one.
    pub handle: Option<String>,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            chat_id: user_id.to_string(),
            handle: None,
            content: content.to_string(),
            received_at: Utc::now(),
        }
    }

    pub fn with_chat_id(mut self, chat_id: &str) -> Self {
        self.chat_id = chat_id.to_string();
        self
    }

    pub fn with_handle(mut self, handle: &str) -> Self {
        self.handle = Some(handle.to_string());
        self
    }
}

/// Rich-text rendering mode for outbound text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
}

/// A text message to deliver to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub disable_link_preview: bool,
}

impl OutgoingMessage {
    /// Plain text, no parse mode.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            disable_link_preview: false,
        }
    }

    /// Text rendered as HTML.
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: Some(ParseMode::Html),
            disable_link_preview: false,
        }
    }

    pub fn without_link_preview(mut self) -> Self {
        self.disable_link_preview = true;
        self
    }
}

/// Stream of inbound messages produced by [`Channel::start`].
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A messaging gateway: reports incoming text and delivers outgoing text.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name (e.g. "telegram", "cli").
    fn name(&self) -> &str;

    /// Start listening and return the stream of inbound messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver a text message to a chat.
    async fn send_text(&self, chat_id: &str, message: OutgoingMessage)
    -> Result<(), ChannelError>;

    /// Show a "typing…" indicator in a chat.
    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
