use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, OutboundChatMessage};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Payload is the room id
    JoinChatRoom(String),
    SendMessage(ChatMessage),
    Ping,
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinChatRoom(_) => "join_chat_room",
            Self::SendMessage(_) => "send_message",
            Self::Ping => "ping",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    NewMessage(OutboundChatMessage),
    Pong,
    Heartbeat,
    /// Only for frames the server could not understand
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join_chat_room() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join_chat_room","payload":"room1"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::JoinChatRoom(ref room) if room == "room1"));
    }

    #[test]
    fn test_parse_send_message() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"send_message","payload":{"chatId":"room1","senderId":"u1","text":"hi"}}"#,
        )
        .unwrap();

        match msg {
            ClientMessage::SendMessage(message) => {
                assert_eq!(message.chat_id, "room1");
                assert_eq!(message.sender_id, "u1");
                assert_eq!(message.text, "hi");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ping_without_payload() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.kind(), "ping");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"delete_message","payload":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_message_wire_format() {
        let outbound = OutboundChatMessage::unpersisted(ChatMessage::new("room1", "u1", "hi"));
        let value = serde_json::to_value(ServerMessage::NewMessage(outbound)).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "new_message",
                "payload": {"chatId": "room1", "senderId": "u1", "text": "hi"}
            })
        );
    }

    #[test]
    fn test_error_wire_format() {
        let value = serde_json::to_value(ServerMessage::error("INVALID_MESSAGE", "bad")).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["code"], "INVALID_MESSAGE");
    }
}
