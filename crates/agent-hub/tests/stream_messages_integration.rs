//! End-to-end tests driving the real `StreamMessages`/`RegisterAgent` RPCs
//! over a loopback TCP listener, matching the hub specification's
//! end-to-end scenarios: direct live delivery, broadcast fan-out, offline
//! replay, auth mismatch, duplicate bind, and heartbeat no-op.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::StreamExt;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Code, Request};

use agent_hub::agents::AgentRegistry;
use agent_hub::auth::JwtManager;
use agent_hub::registry::SessionTable;
use agent_hub::router::Router;
use agent_hub::server::AgentCommServiceImpl;
use agent_hub::store::MessageStore;

use agent_hub_proto::v1::agent_comm_service_client::AgentCommServiceClient;
use agent_hub_proto::v1::agent_comm_service_server::AgentCommServiceServer;
use agent_hub_proto::v1::{Message, MessageType, RegisterAgentRequest};

/// Spawn a hub server bound to an ephemeral loopback port, returning its
/// address. The server task runs for the lifetime of the test process.
async fn spawn_hub() -> SocketAddr {
    let store = MessageStore::open_in_memory().await.unwrap();
    let jwt = Arc::new(JwtManager::new(b"integration-test-secret", 3600));
    let agents = AgentRegistry::new(jwt.clone());
    let sessions = SessionTable::new();
    let router = Router::new(sessions.clone());

    let service = AgentCommServiceImpl::new(
        jwt,
        agents,
        store,
        sessions,
        router,
        Duration::from_millis(20),
        Duration::from_secs(1),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(AgentCommServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    // Give the listener a moment to start accepting before clients connect.
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

async fn connect(addr: SocketAddr) -> AgentCommServiceClient<Channel> {
    AgentCommServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap()
}

async fn register(client: &mut AgentCommServiceClient<Channel>, name: &str) -> (String, String) {
    let resp = client
        .register_agent(Request::new(RegisterAgentRequest {
            agent_name: name.to_string(),
            agent_type: "integration-test".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    (resp.agent_id, resp.token)
}

fn bearer<T>(inner: T, token: &str) -> Request<T> {
    let mut req = Request::new(inner);
    req.metadata_mut().insert(
        "authorization",
        MetadataValue::try_from(format!("Bearer {token}")).unwrap(),
    );
    req
}

/// Open a `StreamMessages` call authenticated as `token`, sending `first` as
/// the binding first frame. Returns a sender for further outbound frames and
/// the inbound stream of delivered messages.
async fn open_stream(
    client: &mut AgentCommServiceClient<Channel>,
    token: &str,
    first: Message,
) -> Result<(mpsc::Sender<Message>, tonic::Streaming<Message>), tonic::Status> {
    let (tx, rx) = mpsc::channel(8);
    tx.send(first).await.unwrap();
    let resp = client
        .stream_messages(bearer(ReceiverStream::new(rx), token))
        .await?;
    Ok((tx, resp.into_inner()))
}

fn heartbeat(agent_id: &str) -> Message {
    Message {
        sender_id: agent_id.to_string(),
        message_type: MessageType::Heartbeat as i32,
        ..Default::default()
    }
}

#[tokio::test]
async fn direct_live_delivery() {
    let addr = spawn_hub().await;
    let mut reg = connect(addr).await;

    let (a_id, a_token) = register(&mut reg, "agent-a").await;
    let (b_id, b_token) = register(&mut reg, "agent-b").await;

    let mut b_client = connect(addr).await;
    let (_b_tx, mut b_in) = open_stream(&mut b_client, &b_token, heartbeat(&b_id))
        .await
        .unwrap();

    let mut a_client = connect(addr).await;
    let (_a_tx, mut a_in) = open_stream(
        &mut a_client,
        &a_token,
        Message {
            sender_id: a_id.clone(),
            recipient_id: b_id.clone(),
            message_type: MessageType::Direct as i32,
            payload: b"ping".to_vec(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(2), b_in.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(delivered.sender_id, a_id);
    assert_eq!(delivered.payload, b"ping");

    let nothing_for_a = tokio::time::timeout(Duration::from_millis(200), a_in.next()).await;
    assert!(
        nothing_for_a.is_err(),
        "the sender must not receive its own direct message"
    );
}

#[tokio::test]
async fn broadcast_fan_out_excludes_sender() {
    let addr = spawn_hub().await;
    let mut reg = connect(addr).await;

    let (a_id, a_token) = register(&mut reg, "agent-a").await;
    let (b_id, b_token) = register(&mut reg, "agent-b").await;
    let (c_id, c_token) = register(&mut reg, "agent-c").await;

    let mut b_client = connect(addr).await;
    let (_b_tx, mut b_in) = open_stream(&mut b_client, &b_token, heartbeat(&b_id))
        .await
        .unwrap();
    let mut c_client = connect(addr).await;
    let (_c_tx, mut c_in) = open_stream(&mut c_client, &c_token, heartbeat(&c_id))
        .await
        .unwrap();

    let mut a_client = connect(addr).await;
    let (_a_tx, mut a_in) = open_stream(
        &mut a_client,
        &a_token,
        Message {
            sender_id: a_id.clone(),
            message_type: MessageType::Broadcast as i32,
            payload: b"hi".to_vec(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let for_b = tokio::time::timeout(Duration::from_secs(2), b_in.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let for_c = tokio::time::timeout(Duration::from_secs(2), c_in.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(for_b.payload, b"hi");
    assert_eq!(for_c.payload, b"hi");

    let nothing_for_a = tokio::time::timeout(Duration::from_millis(200), a_in.next()).await;
    assert!(nothing_for_a.is_err());
}

#[tokio::test]
async fn offline_then_reconnect_replay() {
    let addr = spawn_hub().await;
    let mut reg = connect(addr).await;

    let (a_id, a_token) = register(&mut reg, "agent-a").await;
    let (b_id, b_token) = register(&mut reg, "agent-b").await;

    // B is not connected yet when A sends the direct message.
    let mut a_client = connect(addr).await;
    let (_a_tx, mut a_in) = open_stream(
        &mut a_client,
        &a_token,
        Message {
            sender_id: a_id.clone(),
            recipient_id: b_id.clone(),
            message_type: MessageType::Direct as i32,
            payload: b"later".to_vec(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Now B connects; the replay poller (20ms interval in this harness)
    // should deliver the message it missed.
    let mut b_client = connect(addr).await;
    let (_b_tx, mut b_in) = open_stream(&mut b_client, &b_token, heartbeat(&b_id))
        .await
        .unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(2), b_in.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(delivered.payload, b"later");

    let nothing_for_a = tokio::time::timeout(Duration::from_millis(200), a_in.next()).await;
    assert!(nothing_for_a.is_err());
}

#[tokio::test]
async fn auth_mismatch_is_rejected_before_any_session() {
    let addr = spawn_hub().await;
    let mut reg = connect(addr).await;
    let (a_id, a_token) = register(&mut reg, "agent-a").await;

    let mut client = connect(addr).await;
    let err = open_stream(
        &mut client,
        &a_token,
        Message {
            sender_id: "agent-impersonator".to_string(),
            message_type: MessageType::Heartbeat as i32,
            ..Default::default()
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::Unauthenticated);
    let _ = a_id;
}

#[tokio::test]
async fn duplicate_bind_tears_down_the_prior_stream() {
    let addr = spawn_hub().await;
    let mut reg = connect(addr).await;
    let (a_id, a_token) = register(&mut reg, "agent-a").await;
    let (b_id, b_token) = register(&mut reg, "agent-b").await;

    let mut s1_client = connect(addr).await;
    let (_s1_tx, mut s1_in) = open_stream(&mut s1_client, &a_token, heartbeat(&a_id))
        .await
        .unwrap();

    // A reconnects on a second stream while S1 is still bound.
    let mut s2_client = connect(addr).await;
    let (_s2_tx, mut s2_in) = open_stream(&mut s2_client, &a_token, heartbeat(&a_id))
        .await
        .unwrap();

    // S1 must be torn down: its outbound stream ends (cleanly or with an
    // error), rather than continuing to receive traffic meant for agent-a.
    let s1_closed = tokio::time::timeout(Duration::from_secs(2), s1_in.next()).await;
    assert!(matches!(s1_closed, Ok(None) | Ok(Some(Err(_)))));

    // Subsequent direct messages to agent-a go to S2 only.
    let mut b_client = connect(addr).await;
    let (_b_tx, _b_in) = open_stream(
        &mut b_client,
        &b_token,
        Message {
            sender_id: b_id.clone(),
            recipient_id: a_id.clone(),
            message_type: MessageType::Direct as i32,
            payload: b"to-s2".to_vec(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(2), s2_in.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(delivered.payload, b"to-s2");
}

#[tokio::test]
async fn heartbeat_produces_no_delivery() {
    let addr = spawn_hub().await;
    let mut reg = connect(addr).await;
    let (a_id, a_token) = register(&mut reg, "agent-a").await;

    let mut client = connect(addr).await;
    let (tx, mut in_stream) = open_stream(&mut client, &a_token, heartbeat(&a_id))
        .await
        .unwrap();

    tx.send(heartbeat(&a_id)).await.unwrap();

    let nothing = tokio::time::timeout(Duration::from_millis(300), in_stream.next()).await;
    assert!(nothing.is_err(), "heartbeats must never be echoed back");
}
