pub mod telegram;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::DeliveryError;

/// Webhook payload as delivered by the messaging platform.
/// Only the fields the admission filter looks at are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<InboundMessage>,
}

/// A chat message received through the webhook
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "message_id")]
    pub id: i64,
    pub chat: Chat,
    /// Absent for channel posts
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub text: Option<String>,
    /// Unix timestamp (seconds) of when the message was sent
    #[serde(rename = "date")]
    pub timestamp: i64,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
}

impl InboundMessage {
    pub fn chat_id(&self) -> i64 {
        self.chat.id
    }

    pub fn sender_is_bot(&self) -> bool {
        self.from.as_ref().is_some_and(|sender| sender.is_bot)
    }

    pub fn has_entity(&self, kind: &str) -> bool {
        self.entities.iter().any(|entity| entity.kind == kind)
    }
}

/// Outbound side of the messaging platform
#[async_trait]
pub trait ChatReplier: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}
