//! Data model for persisted messages.

use serde::{Deserialize, Serialize};

/// A message as stored in and returned from the message store.
///
/// `message_type` mirrors the wire `MessageType` enum's numeric values
/// (`DIRECT = 0`, `BROADCAST = 1`, `EVENT = 2`, `HEARTBEAT = 3`); the store
/// itself is agnostic to what the values mean.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub message_id: i64,
    pub sender_id: String,
    pub recipient_id: Option<String>,
    pub message_type: i32,
    pub payload: Vec<u8>,
    pub timestamp: i64,
    pub correlation_id: Option<String>,
}

impl From<&Message> for agent_hub_proto::v1::Message {
    fn from(m: &Message) -> Self {
        Self {
            message_id: m.message_id,
            sender_id: m.sender_id.clone(),
            recipient_id: m.recipient_id.clone().unwrap_or_default(),
            message_type: m.message_type,
            payload: m.payload.clone(),
            timestamp: m.timestamp,
            correlation_id: m.correlation_id.clone().unwrap_or_default(),
        }
    }
}
