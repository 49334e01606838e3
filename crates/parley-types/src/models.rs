use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message as it travels over the wire and rests in the store.
/// The id is chosen by whoever creates the message and is never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// Omitted by senders that don't track it; the store defaults to `Sent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

/// Coarse role tag on a message — not a precise identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    Contact,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
            Sender::Contact => "contact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "ai" => Some(Sender::Ai),
            "contact" => Some(Sender::Contact),
            _ => None,
        }
    }
}

/// Delivery state of a message. The declaration order is the transition
/// order: a status only ever advances, never moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_is_transition_order() {
        assert!(MessageStatus::Sent < MessageStatus::Delivered);
        assert!(MessageStatus::Delivered < MessageStatus::Read);
    }

    #[test]
    fn status_roundtrips_through_str() {
        for status in [
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
        ] {
            assert_eq!(MessageStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MessageStatus::parse("seen"), None);
    }

    #[test]
    fn message_without_status_serializes_without_the_key() {
        let message = ChatMessage {
            id: "m1".into(),
            text: "hi".into(),
            sender: Sender::User,
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
            status: None,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["sender"], "user");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }
}
