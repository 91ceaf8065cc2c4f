//! `AgentCommService` gRPC implementation: registration and the bidirectional
//! message stream.
//!
//! Grounded on the teacher's `TunnelServiceImpl::open_tunnel`: read the first
//! frame to identify the peer, register it, spawn a task draining an mpsc
//! channel to the outbound stream, process subsequent inbound frames in a
//! loop, clean up on stream end. Unlike the teacher, whose JWT check runs in
//! a separate interceptor before the stream is even accepted, `AwaitingAuth`
//! happens inline here because `RegisterAgent` on the same service must stay
//! unauthenticated.

use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, instrument, warn};

use agent_hub_proto::v1::agent_comm_service_server::AgentCommService;
use agent_hub_proto::v1::{Message as ProtoMessage, RegisterAgentRequest, RegisterAgentResponse};

use crate::agents::AgentRegistry;
use crate::auth::JwtManager;
use crate::registry::SessionTable;
use crate::router::Router;
use crate::server::interceptor::authenticate;
use crate::store::MessageStore;

type StreamMessagesStream =
    Pin<Box<dyn Stream<Item = Result<ProtoMessage, Status>> + Send + 'static>>;

pub struct AgentCommServiceImpl {
    jwt: std::sync::Arc<JwtManager>,
    agents: AgentRegistry,
    store: MessageStore,
    sessions: SessionTable,
    router: Router,
    replay_poll_interval: Duration,
    replay_backoff_max: Duration,
}

impl AgentCommServiceImpl {
    pub fn new(
        jwt: std::sync::Arc<JwtManager>,
        agents: AgentRegistry,
        store: MessageStore,
        sessions: SessionTable,
        router: Router,
        replay_poll_interval: Duration,
        replay_backoff_max: Duration,
    ) -> Self {
        Self {
            jwt,
            agents,
            store,
            sessions,
            router,
            replay_poll_interval,
            replay_backoff_max,
        }
    }
}

#[tonic::async_trait]
impl AgentCommService for AgentCommServiceImpl {
    type StreamMessagesStream = StreamMessagesStream;

    #[instrument(skip(self, request), fields(rpc = "RegisterAgent"))]
    async fn register_agent(
        &self,
        request: Request<RegisterAgentRequest>,
    ) -> Result<Response<RegisterAgentResponse>, Status> {
        let req = request.into_inner();

        let (agent_id, token) = self
            .agents
            .register(&req.agent_name, &req.agent_type)
            .map_err(|e| Status::internal(format!("token mint failed: {e}")))?;

        Ok(Response::new(RegisterAgentResponse {
            agent_id,
            token,
            message: "registered".to_string(),
        }))
    }

    #[instrument(skip(self, request), fields(rpc = "StreamMessages"))]
    async fn stream_messages(
        &self,
        request: Request<Streaming<ProtoMessage>>,
    ) -> Result<Response<Self::StreamMessagesStream>, Status> {
        // AwaitingAuth
        let claims = authenticate(request.metadata(), &self.jwt)?;
        let agent_id = claims.agent_id().to_string();

        let mut in_stream = request.into_inner();

        // AwaitingFirstFrame
        let first_frame = match in_stream.next().await {
            None => {
                debug!(agent_id = %agent_id, "Stream closed before first frame");
                return Ok(Response::new(Box::pin(tokio_stream::empty())));
            }
            Some(Err(status)) => return Err(status),
            Some(Ok(frame)) => frame,
        };

        if first_frame.sender_id != agent_id {
            warn!(
                agent_id = %agent_id,
                sender_id = %first_frame.sender_id,
                "First frame sender_id does not match token subject"
            );
            return Err(Status::unauthenticated(
                "sender_id does not match the authenticated agent",
            ));
        }

        // Bound
        let (outbound_tx, outbound_rx) =
            mpsc::unbounded_channel::<Result<ProtoMessage, Status>>();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<ProtoMessage>();

        let store = self.store.clone();
        let router = self.router.clone();
        let sessions = self.sessions.clone();

        let sender_handle = tokio::spawn(run_sender(queue_rx, outbound_tx));
        let sender_abort = sender_handle.abort_handle();

        let replay_handle = crate::replay::spawn(
            agent_id.clone(),
            store.clone(),
            queue_tx.clone(),
            self.replay_poll_interval,
            self.replay_backoff_max,
        );
        let replay_abort = replay_handle.abort_handle();

        let recv_handle = tokio::spawn(run_recv_loop(
            agent_id.clone(),
            first_frame,
            in_stream,
            store,
            router,
            sessions.clone(),
            queue_tx.clone(),
            sender_abort.clone(),
            replay_abort.clone(),
        ));
        let recv_abort = recv_handle.abort_handle();

        sessions
            .bind(&agent_id, queue_tx, recv_abort, sender_abort, replay_abort)
            .await;

        let out_stream = UnboundedReceiverStream::new(outbound_rx);
        Ok(Response::new(Box::pin(out_stream)))
    }
}

/// Drains the session's delivery queue onto the outbound half of the stream.
async fn run_sender(
    mut queue_rx: mpsc::UnboundedReceiver<ProtoMessage>,
    outbound_tx: mpsc::UnboundedSender<Result<ProtoMessage, Status>>,
) {
    while let Some(message) = queue_rx.recv().await {
        if outbound_tx.send(Ok(message)).is_err() {
            // Client gone; the recv loop will notice on its own next read and drain.
            break;
        }
    }
}

/// Persists and routes inbound frames, starting with the one already read to
/// identify the peer. Runs until the inbound stream ends or errors, then
/// tears the session down.
#[allow(clippy::too_many_arguments)]
async fn run_recv_loop(
    agent_id: String,
    first_frame: ProtoMessage,
    mut in_stream: Streaming<ProtoMessage>,
    store: MessageStore,
    router: Router,
    sessions: SessionTable,
    queue_tx: mpsc::UnboundedSender<ProtoMessage>,
    sender_abort: AbortHandle,
    replay_abort: AbortHandle,
) {
    info!(agent_id = %agent_id, "Session bound, entering recv loop");

    if let Err(error) = ingest(&store, &router, &agent_id, first_frame).await {
        warn!(agent_id = %agent_id, %error, "Failed to persist first frame");
    }

    loop {
        match in_stream.next().await {
            None => {
                debug!(agent_id = %agent_id, "Inbound stream closed");
                break;
            }
            Some(Err(error)) => {
                warn!(agent_id = %agent_id, %error, "Inbound stream error");
                break;
            }
            Some(Ok(frame)) => {
                if let Err(error) = ingest(&store, &router, &agent_id, frame).await {
                    warn!(agent_id = %agent_id, %error, "Failed to persist frame, dropped from live routing");
                }
            }
        }
    }

    sessions.release(&agent_id, &queue_tx).await;
    sender_abort.abort();
    replay_abort.abort();
    info!(agent_id = %agent_id, "Session draining complete");
}

/// Persist then route a single inbound frame, per kind. `HEARTBEAT` frames
/// are accepted but neither persisted nor routed.
async fn ingest(
    store: &MessageStore,
    router: &Router,
    agent_id: &str,
    frame: ProtoMessage,
) -> Result<(), crate::store::DatabaseError> {
    if frame.message_type == agent_hub_proto::v1::MessageType::Heartbeat as i32 {
        debug!(agent_id = %agent_id, "Heartbeat frame, not persisted or routed");
        return Ok(());
    }

    let recipient_id = (!frame.recipient_id.is_empty()).then_some(frame.recipient_id.as_str());
    let correlation_id = (!frame.correlation_id.is_empty()).then_some(frame.correlation_id.as_str());

    let persisted = store
        .append(
            agent_id,
            recipient_id,
            frame.message_type,
            frame.payload,
            correlation_id,
        )
        .await?;

    router.route(&persisted).await;
    Ok(())
}
