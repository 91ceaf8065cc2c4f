//! Reconnect replay: a per-session polling task that delivers anything a
//! session missed while disconnected.
//!
//! Generalized from the teacher's `BufferManager::drain_buffer` (a
//! push-on-reconnect drain of an offline-machine buffer table, triggered
//! once) into a repeating poll loop with backoff, per the hub's explicit
//! at-least-once replay policy.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use agent_hub_proto::v1::Message as ProtoMessage;

use crate::store::MessageStore;

/// Spawn a replay task for `agent_id`, enqueueing onto `tx` until cancelled.
///
/// The cursor starts at an epoch sentinel (`i64::MIN`): the hub does not
/// persist a per-agent last-seen timestamp, so a reconnecting agent may
/// observe historical messages, which the hub's replay policy accepts.
pub fn spawn(
    agent_id: String,
    store: MessageStore,
    tx: mpsc::UnboundedSender<ProtoMessage>,
    poll_interval: Duration,
    backoff_max: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cursor = i64::MIN;
        let mut backoff = poll_interval;

        loop {
            tokio::time::sleep(backoff).await;

            match store.scan_after(&agent_id, cursor).await {
                Ok(messages) => {
                    backoff = poll_interval;
                    for message in &messages {
                        if tx.send(message.into()).is_err() {
                            // Sender task gone; session is being torn down.
                            return;
                        }
                        cursor = message.timestamp;
                    }
                }
                Err(error) => {
                    warn!(agent_id = %agent_id, %error, "Replay scan failed, backing off");
                    backoff = (backoff * 2).min(backoff_max);
                }
            }
        }
    })
}
