//! Append and replay queries over the message store.

use agent_hub_proto::v1::MessageType;

use super::db::{DatabaseError, MessageStore};
use super::models::Message;

impl MessageStore {
    /// Append a message, assigning it a server timestamp and ID.
    ///
    /// The timestamp is `max(now_nanos(), last_assigned + 1)`, computed and
    /// persisted under the store's append lock so concurrent callers never
    /// observe two messages with the same or out-of-order timestamp.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        sender_id: &str,
        recipient_id: Option<&str>,
        message_type: i32,
        payload: Vec<u8>,
        correlation_id: Option<&str>,
    ) -> Result<Message, DatabaseError> {
        let mut last_timestamp = self.append_lock().lock().await;

        let now = agent_hub_core::db::unix_timestamp_nanos();
        let timestamp = now.max(*last_timestamp + 1);

        let message_id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO agent_messages
                (sender_id, recipient_id, message_type, payload, timestamp, correlation_id)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING message_id
            ",
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(message_type)
        .bind(&payload)
        .bind(timestamp)
        .bind(correlation_id)
        .fetch_one(self.pool())
        .await?;

        *last_timestamp = timestamp;
        drop(last_timestamp);

        Ok(Message {
            message_id,
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.map(str::to_string),
            message_type,
            payload,
            timestamp,
            correlation_id: correlation_id.map(str::to_string),
        })
    }

    /// Return messages addressed to `agent_id` (directly, or by broadcast/event)
    /// with `timestamp > after`, oldest first, excluding messages sent by
    /// `agent_id` itself and any `HEARTBEAT` row (heartbeats are never
    /// replayed, even if one was ever persisted by mistake).
    pub async fn scan_after(
        &self,
        agent_id: &str,
        after: i64,
    ) -> Result<Vec<Message>, DatabaseError> {
        let broadcast = MessageType::Broadcast as i32;
        let event = MessageType::Event as i32;
        let heartbeat = MessageType::Heartbeat as i32;

        let rows = sqlx::query_as::<_, Message>(
            r"
            SELECT message_id, sender_id, recipient_id, message_type, payload, timestamp, correlation_id
            FROM agent_messages
            WHERE timestamp > ?
              AND sender_id != ?
              AND message_type != ?
              AND (
                recipient_id = ?
                OR recipient_id IS NULL
                OR message_type IN (?, ?)
              )
            ORDER BY timestamp ASC, message_id ASC
            ",
        )
        .bind(after)
        .bind(agent_id)
        .bind(heartbeat)
        .bind(agent_id)
        .bind(broadcast)
        .bind(event)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_assigns_monotonic_timestamps() {
        let store = MessageStore::open_in_memory().await.unwrap();

        let m1 = store
            .append("agent-a", Some("agent-b"), MessageType::Direct as i32, vec![1], None)
            .await
            .unwrap();
        let m2 = store
            .append("agent-a", Some("agent-b"), MessageType::Direct as i32, vec![2], None)
            .await
            .unwrap();

        assert!(m2.timestamp > m1.timestamp);
        assert!(m2.message_id > m1.message_id);
    }

    #[tokio::test]
    async fn scan_after_excludes_sender_and_respects_cursor() {
        let store = MessageStore::open_in_memory().await.unwrap();

        let m1 = store
            .append("agent-a", Some("agent-b"), MessageType::Direct as i32, vec![1], None)
            .await
            .unwrap();
        store
            .append("agent-b", Some("agent-a"), MessageType::Direct as i32, vec![2], None)
            .await
            .unwrap();

        let for_b = store.scan_after("agent-b", 0).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].message_id, m1.message_id);

        let for_b_after = store.scan_after("agent-b", m1.timestamp).await.unwrap();
        assert!(for_b_after.is_empty());
    }

    #[tokio::test]
    async fn scan_after_includes_broadcast_and_event() {
        let store = MessageStore::open_in_memory().await.unwrap();

        store
            .append("agent-a", None, MessageType::Broadcast as i32, vec![1], None)
            .await
            .unwrap();
        store
            .append("agent-a", None, MessageType::Event as i32, vec![2], None)
            .await
            .unwrap();
        store
            .append("agent-a", None, MessageType::Heartbeat as i32, vec![3], None)
            .await
            .unwrap();

        let for_c = store.scan_after("agent-c", 0).await.unwrap();
        assert_eq!(for_c.len(), 2);
        assert!(for_c.iter().all(|m| m.message_type != MessageType::Heartbeat as i32));
    }

    #[tokio::test]
    async fn scan_after_excludes_direct_messages_to_others() {
        let store = MessageStore::open_in_memory().await.unwrap();

        store
            .append("agent-a", Some("agent-b"), MessageType::Direct as i32, vec![1], None)
            .await
            .unwrap();

        let for_c = store.scan_after("agent-c", 0).await.unwrap();
        assert!(for_c.is_empty());
    }
}
