//! Agent Hub
//!
//! Core messaging hub for a multi-agent communication platform: authenticates
//! agents, maintains a bidirectional message stream per agent, persists
//! every message, and routes direct/broadcast/event traffic in real time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tonic::transport::Server;
use tracing::info;

use agent_hub_core::config::HubConfig;
use agent_hub_core::tracing_init::init_tracing;
use agent_hub_proto::v1::agent_comm_service_server::AgentCommServiceServer;
use agent_hub_proto::v1::health_server::HealthServer as HubHealthServer;

use agent_hub::agents::AgentRegistry;
use agent_hub::auth::JwtManager;
use agent_hub::registry::SessionTable;
use agent_hub::router::Router;
use agent_hub::server::{AgentCommServiceImpl, HubHealthService};
use agent_hub::store::MessageStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("agent_hub=info", false);

    let config = HubConfig::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.addr,
        ui_addr = %config.ui_addr,
        "Starting agent-hub"
    );

    let db_path = config.resolved_db_path();
    info!(path = %db_path.display(), "Opening message store");
    let store = MessageStore::open(&db_path).await?;

    let jwt = Arc::new(JwtManager::new(
        config.jwt_secret.as_bytes(),
        config.jwt_ttl_secs,
    ));
    let agents = AgentRegistry::new(jwt.clone());
    let sessions = SessionTable::new();
    let router = Router::new(sessions.clone());

    let replay_poll_interval = Duration::from_secs(config.replay_poll_interval_secs);
    let replay_backoff_max = Duration::from_secs(config.replay_backoff_max_secs);

    let comm_service = AgentCommServiceImpl::new(
        jwt.clone(),
        agents,
        store.clone(),
        sessions,
        router,
        replay_poll_interval,
        replay_backoff_max,
    );

    let (health_reporter, tonic_health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<AgentCommServiceServer<AgentCommServiceImpl>>()
        .await;

    let grpc_addr = config.addr;
    let grpc_server = Server::builder()
        .add_service(AgentCommServiceServer::new(comm_service))
        .add_service(tonic_health_service)
        .add_service(HubHealthServer::new(HubHealthService::new()))
        .serve(grpc_addr);

    let ui_addr = config.ui_addr;
    let sse_app = agent_hub::sse::router(store, jwt, replay_poll_interval);

    info!(addr = %grpc_addr, "gRPC server listening");
    info!(addr = %ui_addr, "UI push bridge listening");

    tokio::select! {
        result = grpc_server => {
            result?;
        }
        result = serve_ui(sse_app, ui_addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("agent-hub stopped");
    Ok(())
}

/// Serve the UI Push Bridge's axum router on `addr`.
async fn serve_ui(app: axum::Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
