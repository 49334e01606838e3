use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// The full wire vocabulary of the relay. Every frame is one flat JSON
/// object discriminated by `type`; the same shapes are used in both
/// directions, so a broadcast re-emits exactly what was received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    /// Client declares which user this connection speaks for.
    Identify { user_id: String },

    /// A new chat message. Persisted before it is fanned out.
    Message {
        conversation_id: String,
        message: ChatMessage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },

    /// Client asks for the stored history of one conversation.
    GetHistory { conversation_id: String },

    /// Server reply to `GetHistory`, sent only to the requesting connection.
    History {
        conversation_id: String,
        messages: Vec<ChatMessage>,
    },

    /// Typing indicator, relayed to everyone.
    Typing {
        conversation_id: String,
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },

    /// Marks one message (or, without a messageId, every unread message in
    /// the conversation not sent by `user`) as read.
    ReadReceipt {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },

    /// Marks one message as delivered.
    DeliveredReceipt {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },

    /// Call invitation, delivered only to the target user's connections.
    CallRequest {
        target_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },

    /// Accept/decline answer to a call request, targeted like the request.
    CallResponse {
        target_id: String,
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },

    /// Opaque SDP/ICE payload relayed verbatim between two peers. The
    /// relay never looks inside `signal`.
    WebrtcSignal {
        target_id: String,
        signal: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageStatus, Sender};

    #[test]
    fn identify_uses_flat_camel_case_keys() {
        let event: Event = serde_json::from_str(r#"{"type":"identify","userId":"luis"}"#).unwrap();
        match event {
            Event::Identify { user_id } => assert_eq!(user_id, "luis"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn message_event_carries_nested_message() {
        let raw = r#"{
            "type": "message",
            "conversationId": "c1",
            "senderId": "luis",
            "message": {
                "id": "m1",
                "text": "hi",
                "sender": "user",
                "timestamp": "2024-05-01T12:00:00Z",
                "status": "sent"
            }
        }"#;

        let event: Event = serde_json::from_str(raw).unwrap();
        let Event::Message {
            conversation_id,
            message,
            sender_id,
        } = event
        else {
            panic!("wrong variant");
        };
        assert_eq!(conversation_id, "c1");
        assert_eq!(sender_id.as_deref(), Some("luis"));
        assert_eq!(message.id, "m1");
        assert_eq!(message.sender, Sender::User);
        assert_eq!(message.status, Some(MessageStatus::Sent));
    }

    #[test]
    fn read_receipt_without_message_id_parses() {
        let event: Event =
            serde_json::from_str(r#"{"type":"read_receipt","conversationId":"c1","senderId":"b"}"#)
                .unwrap();
        let Event::ReadReceipt {
            conversation_id,
            message_id,
            ..
        } = event
        else {
            panic!("wrong variant");
        };
        assert_eq!(conversation_id.as_deref(), Some("c1"));
        assert_eq!(message_id, None);
    }

    #[test]
    fn webrtc_signal_payload_survives_reserialization() {
        let raw = r#"{"type":"webrtc_signal","targetId":"bob","signal":{"sdp":{"type":"offer","sdp":"v=0"}}}"#;
        let event: Event = serde_json::from_str(raw).unwrap();

        let reserialized = serde_json::to_value(&event).unwrap();
        assert_eq!(reserialized["type"], "webrtc_signal");
        assert_eq!(reserialized["targetId"], "bob");
        assert_eq!(reserialized["signal"]["sdp"]["sdp"], "v=0");
        // senderId was absent on input and must stay absent on output
        assert!(reserialized.get("senderId").is_none());
    }

    #[test]
    fn history_serializes_with_snake_case_tag() {
        let event = Event::History {
            conversation_id: "c1".into(),
            messages: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "history");
        assert_eq!(json["conversationId"], "c1");
        assert!(json["messages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Event>(r#"{"type":"presence","userId":"x"}"#).is_err());
        assert!(serde_json::from_str::<Event>("not json").is_err());
    }
}
