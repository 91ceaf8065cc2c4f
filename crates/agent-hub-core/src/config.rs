//! Configuration surface for agent-hub.
//!
//! Every setting has a built-in default and can be overridden by an
//! environment variable or a CLI flag (CLI wins), following the
//! lowest-to-highest resolution order used across the rest of the
//! workspace: defaults, then environment, then explicit arguments.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Hub-wide configuration, parsed once at startup and shared by the gRPC
/// server and the UI push bridge.
#[derive(Parser, Debug, Clone)]
#[command(name = "agent-hub")]
#[command(about = "Core messaging hub for a multi-agent communication platform")]
pub struct HubConfig {
    /// Address the `StreamMessages`/`RegisterAgent` gRPC surface listens on.
    #[arg(long, env = "HUB_ADDR", default_value = "[::]:50051")]
    pub addr: SocketAddr,

    /// Address the UI Server-Sent-Events bridge listens on.
    #[arg(long, env = "HUB_UI_ADDR", default_value = "0.0.0.0:8080")]
    pub ui_addr: SocketAddr,

    /// Path to the SQLite database file backing the message store.
    #[arg(long, env = "HUB_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Symmetric secret used to sign and verify bearer tokens.
    #[arg(long, env = "HUB_JWT_SECRET")]
    pub jwt_secret: String,

    /// Token time-to-live, in seconds.
    #[arg(long, env = "HUB_JWT_TTL_SECS", default_value_t = 3600)]
    pub jwt_ttl_secs: i64,

    /// Reconnect-replay poll interval, in seconds.
    #[arg(long, env = "HUB_REPLAY_POLL_INTERVAL_SECS", default_value_t = 2)]
    pub replay_poll_interval_secs: u64,

    /// Maximum backoff applied to a failing replay scan, in seconds.
    #[arg(long, env = "HUB_REPLAY_BACKOFF_MAX_SECS", default_value_t = 30)]
    pub replay_backoff_max_secs: u64,
}

impl HubConfig {
    /// Resolve the database path, falling back to a per-user default
    /// directory when none was configured explicitly.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agent-hub")
        .join("hub.db")
}
