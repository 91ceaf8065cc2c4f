//! JWT claims structure for agent-hub auth.

use serde::{Deserialize, Serialize};

/// Claims embedded in a session token.
///
/// A session token identifies exactly one agent; there is no access/refresh
/// split because the hub never sees password credentials to refresh against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the registered agent's ID.
    pub sub: String,
    /// Human-readable agent name, carried for logging convenience.
    pub agent_name: String,
    /// Issued at (unix timestamp, seconds).
    pub iat: i64,
    /// Expiration (unix timestamp, seconds).
    pub exp: i64,
}

impl Claims {
    /// The agent ID this token authenticates.
    pub fn agent_id(&self) -> &str {
        &self.sub
    }
}
