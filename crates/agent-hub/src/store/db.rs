//! SQLite-backed message store for the agent hub.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tokio::sync::Mutex;
use tracing::info;

/// Persists messages and serves them back by recipient and time.
///
/// Appends are serialized through an internal mutex so the hub can derive a
/// strictly-monotonic server timestamp per message without relying on
/// SQLite's transaction ordering, which makes no such guarantee under
/// concurrent writers.
#[derive(Clone)]
pub struct MessageStore {
    pool: Pool<Sqlite>,
    append_lock: std::sync::Arc<Mutex<i64>>,
}

impl MessageStore {
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io(e.to_string()))?;
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
                .map_err(|e| DatabaseError::Connection(e.to_string()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        info!(path = %path.display(), "Message store opened");

        let store = Self::from_pool(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DatabaseError::Connection(e.to_string()))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let store = Self::from_pool(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            append_lock: std::sync::Arc::new(Mutex::new(0)),
        }
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Message store migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Guard serializing message appends, holding the last-assigned timestamp.
    ///
    /// The lock's contents are the last timestamp handed out; `append` reads
    /// and advances it atomically with the insert that follows.
    pub(super) fn append_lock(&self) -> &Mutex<i64> {
        &self.append_lock
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        DatabaseError::Query(e.to_string())
    }
}
