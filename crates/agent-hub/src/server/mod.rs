//! gRPC server implementations for the agent hub.

pub mod health;
pub mod interceptor;
pub mod stream_svc;

pub use health::HubHealthService;
pub use stream_svc::AgentCommServiceImpl;
