use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an event; every event owns exactly one chat room.
pub type EventId = i64;

/// Identifier of an authenticated user.
pub type UserId = i64;

/// Server-trusted identity bound to a connection when it is accepted.
///
/// Every message read from that connection is stamped with these values,
/// whatever the client put in the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    pub event_id: EventId,
    pub user_id: UserId,
    pub username: String,
}

impl ConnectionIdentity {
    pub fn new(event_id: EventId, user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            event_id,
            user_id,
            username: username.into(),
        }
    }
}

/// One chat message as stored in the room log and sent to peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub event_id: EventId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    /// Builds a message from a bound identity and untrusted content.
    pub fn stamped(identity: &ConnectionIdentity, content: String, at: DateTime<Utc>) -> Self {
        Self {
            event_id: identity.event_id,
            user_id: identity.user_id,
            username: identity.username.clone(),
            content,
            timestamp: format_timestamp(at),
        }
    }
}

/// Inbound frame from a peer. Only `content` is read; anything else the
/// client sends (ids, names, timestamps) is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub content: String,
}

impl InboundFrame {
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// RFC 3339 in UTC with whole seconds, so string order is time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
