//! Agent Hub Protocol Buffers
//!
//! Generated protobuf code for the agent-hub gRPC API.
//!
//! This crate contains:
//! - `AgentCommService` for agent registration and bidirectional message streaming
//! - `Health` service for application-level health checking

#![allow(clippy::derive_partial_eq_without_eq)]

/// Agent Hub v1 API definitions.
///
/// All generated types and services are included here.
pub mod v1 {
    tonic::include_proto!("agent_hub.v1");
}

// Re-export v1 as the default API version for convenience
pub use v1::*;

// Re-export prost_types for downstream crates that need Struct/Value conversion
pub use prost_types;
