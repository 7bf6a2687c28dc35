//! Database connection management.

use crate::error::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Open (or create) the SQLite database at `path`.
///
/// `:memory:` is accepted for tests; in-memory databases are pinned to a
/// single connection since every SQLite memory connection is its own
/// database.
///
/// # Errors
/// Returns `StoreError::Open` if the file cannot be opened or created.
pub async fn connect(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path_str = path
        .as_ref()
        .to_str()
        .ok_or_else(|| StoreError::Open("database path is not valid UTF-8".to_string()))?;

    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let in_memory = path_str.contains(":memory:");
    let options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| StoreError::Open(format!("invalid connection string: {e}")))?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Open(format!("failed to connect: {e}")))?;

    tracing::info!("Database pool created at {}", path_str);
    Ok(pool)
}
