//! Authentication module for the agent hub.
//!
//! Provides session token issuance and validation; the hub has no password
//! store, so this is the whole of its auth surface.

pub mod claims;
pub mod jwt;

pub use claims::Claims;
pub use jwt::JwtManager;
