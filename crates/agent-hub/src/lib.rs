//! Agent Hub: core messaging hub library.
//!
//! - `agents`: issues stable agent identities and initial tokens
//! - `auth`: session token issuance and validation
//! - `registry`: the live session table (agent_id -> delivery queue)
//! - `replay`: per-session reconnect-replay poller
//! - `router`: kind-dispatched fan-out into session queues
//! - `server`: gRPC service implementations and wiring helpers
//! - `sse`: UI Push Bridge, a read-only Server-Sent-Events surface
//! - `store`: SQLite-backed append-only message store

pub mod agents;
pub mod auth;
pub mod registry;
pub mod replay;
pub mod router;
pub mod server;
pub mod sse;
pub mod store;
