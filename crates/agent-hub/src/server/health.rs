//! `agent_hub.v1.Health` service for the hub.
//!
//! Alongside the standard `grpc.health.v1.Health` service (exposed via
//! `tonic-health` in `main.rs`), the hub exposes this small application-level
//! check so clients that only speak the hub's own proto package can still
//! verify connectivity.

use std::pin::Pin;

use tokio_stream::Stream;
use tonic::{Request, Response, Status};

use agent_hub_proto::v1::{health_server::Health, HealthCheckRequest, HealthCheckResponse, ServingStatus};

/// Hub-side implementation of `agent_hub.v1.Health`.
#[derive(Clone, Default)]
pub struct HubHealthService;

impl HubHealthService {
    pub const fn new() -> Self {
        Self
    }
}

#[tonic::async_trait]
impl Health for HubHealthService {
    type WatchStream =
        Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send + 'static>>;

    async fn check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        Ok(Response::new(HealthCheckResponse {
            status: ServingStatus::Serving.into(),
        }))
    }

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        Err(Status::unimplemented("Health.Watch is not supported"))
    }
}
