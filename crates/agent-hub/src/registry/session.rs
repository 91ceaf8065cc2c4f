//! In-memory session table mapping a bound agent to its delivery queue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::AbortHandle;
use tracing::info;

use agent_hub_proto::v1::Message as ProtoMessage;

/// A bound agent's live connection state.
///
/// `recv_abort`/`sender_abort`/`replay_abort` let the table forcibly cancel
/// every task belonging to a session being replaced, rather than waiting for
/// its underlying stream to close on its own.
struct Session {
    tx: mpsc::UnboundedSender<ProtoMessage>,
    recv_abort: AbortHandle,
    sender_abort: AbortHandle,
    replay_abort: AbortHandle,
}

/// Thread-safe table of currently bound agent sessions.
///
/// Guarded by a single `RwLock`; iteration takes a snapshot under the guard
/// and releases it before any enqueue, so a slow consumer never holds up a
/// concurrent bind or release.
#[derive(Clone)]
pub struct SessionTable {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind a new session for `agent_id`, tearing down any existing one first.
    ///
    /// Implements the one-stream-per-agent policy: a reconnect always wins
    /// over the session it replaces.
    pub async fn bind(
        &self,
        agent_id: &str,
        tx: mpsc::UnboundedSender<ProtoMessage>,
        recv_abort: AbortHandle,
        sender_abort: AbortHandle,
        replay_abort: AbortHandle,
    ) {
        let new_session = Session {
            tx,
            recv_abort,
            sender_abort,
            replay_abort,
        };
        let previous = self
            .sessions
            .write()
            .await
            .insert(agent_id.to_string(), new_session);

        if let Some(prev) = previous {
            info!(agent_id = %agent_id, "Replacing existing session, tearing down prior connection");
            prev.recv_abort.abort();
            prev.sender_abort.abort();
            prev.replay_abort.abort();
        } else {
            info!(agent_id = %agent_id, "Session bound");
        }
    }

    /// Look up the delivery queue for a bound agent.
    pub async fn lookup(&self, agent_id: &str) -> Option<mpsc::UnboundedSender<ProtoMessage>> {
        self.sessions
            .read()
            .await
            .get(agent_id)
            .map(|s| s.tx.clone())
    }

    /// Snapshot of every currently bound `(agent_id, queue)` pair.
    pub async fn iterate(&self) -> Vec<(String, mpsc::UnboundedSender<ProtoMessage>)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, s)| (id.clone(), s.tx.clone()))
            .collect()
    }

    /// Release a session, but only if `tx` is still the channel on record.
    ///
    /// A session that has already been replaced by a rebind must not be
    /// removed by its own (aborted, but possibly still unwinding) cleanup
    /// path — comparing channel identity avoids that race.
    pub async fn release(&self, agent_id: &str, tx: &mpsc::UnboundedSender<ProtoMessage>) {
        let mut guard = self.sessions.write().await;
        let current_is_self = guard.get(agent_id).is_some_and(|s| s.tx.same_channel(tx));
        if current_is_self {
            guard.remove(agent_id);
            drop(guard);
            info!(agent_id = %agent_id, "Session released");
        }
    }

    /// Count of currently bound sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}
