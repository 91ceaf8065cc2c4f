//! Kind-dispatched fan-out of persisted messages onto live sessions.

use tracing::{debug, warn};

use agent_hub_proto::v1::MessageType;

use crate::registry::SessionTable;
use crate::store::Message;

/// Routes a persisted message onto the Session Table's live delivery queues.
///
/// Restructured from the teacher's request/response correlation model (unary
/// forward-and-await) into a fire-and-forget fan-out: the Router only ever
/// enqueues, it never waits for a reply.
#[derive(Clone)]
pub struct Router {
    sessions: SessionTable,
}

impl Router {
    pub fn new(sessions: SessionTable) -> Self {
        Self { sessions }
    }

    /// Dispatch a persisted message according to its kind.
    pub async fn route(&self, message: &Message) {
        let Ok(kind) = MessageType::try_from(message.message_type) else {
            warn!(
                message_id = message.message_id,
                message_type = message.message_type,
                "Unknown message kind, dropping"
            );
            return;
        };

        match kind {
            MessageType::Direct => self.route_direct(message).await,
            MessageType::Broadcast | MessageType::Event => self.route_fan_out(message).await,
            MessageType::Heartbeat => {
                debug!(message_id = message.message_id, "Heartbeat, no-op");
            }
        }
    }

    async fn route_direct(&self, message: &Message) {
        let Some(recipient_id) = message.recipient_id.as_deref() else {
            warn!(
                message_id = message.message_id,
                "DIRECT message with no recipient_id, dropping"
            );
            return;
        };

        if let Some(tx) = self.sessions.lookup(recipient_id).await {
            if tx.send(message.into()).is_err() {
                warn!(recipient_id = %recipient_id, "Recipient session queue closed, dropping");
            }
        }
        // Absent recipient: the Message Store already has it; Replay delivers on reconnect.
    }

    async fn route_fan_out(&self, message: &Message) {
        let snapshot = self.sessions.iterate().await;
        for (agent_id, tx) in snapshot {
            if agent_id == message.sender_id {
                continue;
            }
            let _ = tx.send(message.into());
        }
    }
}
