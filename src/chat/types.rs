use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::persistence::RecordId;

/// A chat message as sent by a client.
///
/// Fields the relay does not know about are kept in `extra` and re-broadcast untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Room the message is addressed to
    pub chat_id: String,
    /// Filled with the connection's user id when the client leaves it out
    #[serde(default)]
    pub sender_id: String,
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            text: text.into(),
            extra: Map::new(),
        }
    }
}

/// Payload of a `new_message` event: the original message, plus the record id and
/// server timestamp when it was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundChatMessage {
    #[serde(flatten)]
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl OutboundChatMessage {
    /// Message that could not be persisted, forwarded as received
    pub fn unpersisted(message: ChatMessage) -> Self {
        Self {
            message,
            id: None,
            timestamp: None,
        }
    }

    /// Message augmented with persistence metadata. Client-supplied `id`/`timestamp`
    /// fields are replaced by the server's.
    pub fn persisted(mut message: ChatMessage, id: RecordId, timestamp: DateTime<Utc>) -> Self {
        message.extra.remove("id");
        message.extra.remove("timestamp");
        Self {
            message,
            id: Some(id),
            timestamp: Some(timestamp),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}
