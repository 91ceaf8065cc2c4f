//! Agent Registry: issues identities and tokens for new agents.

use std::sync::Arc;

use tracing::info;

use crate::auth::JwtManager;

/// Issues a fresh `agent_id` and session token per registration.
///
/// Grounded on the teacher's `AuthServiceImpl::register`, trimmed of
/// password hashing and credential storage: an agent's identity is its
/// token, there is nothing else to persist. `agent_name`/`agent_type` are
/// advisory and kept only for the log line below.
#[derive(Clone)]
pub struct AgentRegistry {
    jwt: Arc<JwtManager>,
}

impl AgentRegistry {
    pub fn new(jwt: Arc<JwtManager>) -> Self {
        Self { jwt }
    }

    /// Register a new agent, returning its freshly generated ID and token.
    ///
    /// Re-registration under the same `agent_name` yields a new, unrelated
    /// `agent_id` — there is no identity reuse by name.
    pub fn register(
        &self,
        agent_name: &str,
        agent_type: &str,
    ) -> Result<(String, String), jsonwebtoken::errors::Error> {
        let agent_id = uuid::Uuid::new_v4().to_string();
        let (token, _expires_at) = self.jwt.issue_token(&agent_id, agent_name)?;

        info!(agent_id = %agent_id, agent_name, agent_type, "Agent registered");

        Ok((agent_id, token))
    }
}
