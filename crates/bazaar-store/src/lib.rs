//! Bazaarwatch storage layer.
//!
//! Provides `SQLite` access via `SQLx` with embedded, versioned migrations.
//!
//! # Architecture
//!
//! - **Live set**: the `auctions` table mirrors what is currently listed on
//!   the site; rows are upserted with last-write-wins semantics and carry an
//!   `active` flag maintained by the reconciliation pass.
//! - **History**: `auction_history` is append-only, one terminal snapshot
//!   per external id, guarded by a primary-key uniqueness constraint.
//! - **Leaderboards / bans**: flat tables replaced slice-by-slice as the
//!   corresponding scans complete.
//!
//! All writes are safe under at-least-once delivery: re-running a scan over
//! rows that were already stored changes nothing but timestamps.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod auctions;
pub mod bans;
pub mod connection;
pub mod error;
pub mod highscores;
pub mod history;
pub mod migrations;

pub use error::{Result, StoreError};

use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level database interface with migrations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) the database at `path` and run pending migrations.
    ///
    /// # Errors
    /// Returns `StoreError` if the database cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::connect(path).await?;
        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Current schema version (number of applied migrations).
    pub async fn schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
