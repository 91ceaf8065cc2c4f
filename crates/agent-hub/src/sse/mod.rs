//! UI Push Bridge: a read-only Server-Sent-Events surface over the Message
//! Store, for UI clients that want push delivery without speaking gRPC.
//!
//! Not part of the distilled component table, but required by the hub's own
//! purpose statement: "a secondary real-time delivery surface... that reads
//! the same store without duplicating the routing logic." No example repo in
//! the retrieved pack implements SSE; `axum` is the idiomatic choice here
//! (used elsewhere in the pack for web surfaces), kept a thin reader that
//! never touches the Session Table or the Router.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::warn;

use agent_hub_core::db::base64_encode;

use crate::auth::JwtManager;
use crate::store::{self, MessageStore};

/// JSON-over-SSE shape of a message. Mirrors `store::Message` but encodes the
/// opaque payload as base64 rather than a JSON array of byte values.
#[derive(Serialize)]
struct SsePayload<'a> {
    message_id: i64,
    sender_id: &'a str,
    recipient_id: Option<&'a str>,
    message_type: i32,
    payload: String,
    timestamp: i64,
    correlation_id: Option<&'a str>,
}

impl<'a> From<&'a store::Message> for SsePayload<'a> {
    fn from(m: &'a store::Message) -> Self {
        Self {
            message_id: m.message_id,
            sender_id: &m.sender_id,
            recipient_id: m.recipient_id.as_deref(),
            message_type: m.message_type,
            payload: base64_encode(&m.payload),
            timestamp: m.timestamp,
            correlation_id: m.correlation_id.as_deref(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    store: MessageStore,
    jwt: Arc<JwtManager>,
    poll_interval: Duration,
}

/// Build the UI Push Bridge's axum router.
pub fn router(store: MessageStore, jwt: Arc<JwtManager>, poll_interval: Duration) -> Router {
    let state = AppState {
        store,
        jwt,
        poll_interval,
    };

    Router::new()
        .route("/agents/{agent_id}/events", get(agent_events))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    since: i64,
}

async fn agent_events(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state
        .jwt
        .validate(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if claims.agent_id() != agent_id {
        return Err(StatusCode::FORBIDDEN);
    }

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let store = state.store.clone();
    let poll_interval = state.poll_interval;

    tokio::spawn(async move {
        let mut cursor = query.since;
        loop {
            tokio::time::sleep(poll_interval).await;

            match store.scan_after(&agent_id, cursor).await {
                Ok(messages) => {
                    for message in &messages {
                        cursor = message.timestamp;
                        let json = match serde_json::to_string(&SsePayload::from(message)) {
                            Ok(json) => json,
                            Err(error) => {
                                warn!(%error, "Failed to serialize message for SSE");
                                continue;
                            }
                        };
                        if tx.send(Ok(Event::default().data(json))).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    warn!(agent_id = %agent_id, %error, "SSE poll failed");
                }
            }
        }
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}
