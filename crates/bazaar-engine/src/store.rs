//! The narrow storage interface the engine scans and reconciles against.
//!
//! The engine only ever sees this trait; the SQLite implementation lives in
//! `bazaar-store`, and tests substitute an in-memory fake. All operations
//! are safe under at-least-once delivery.

use async_trait::async_trait;
use bazaar_core::{AuctionRecord, BanEntry, ExternalId, HighscoreEntry, HistoricalAuction};
use bazaar_store::{Database, StoreError};
use std::collections::HashSet;

/// Relational store operations consumed by the scan driver and reconciler.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert a live auction (last-write-wins, reactivates the row).
    async fn upsert_auction(&self, record: &AuctionRecord) -> Result<(), StoreError>;

    /// Upsert one fetched leaderboard page.
    async fn upsert_highscores(&self, entries: &[HighscoreEntry]) -> Result<(), StoreError>;

    /// Record one fetched ban-list page.
    async fn upsert_bans(&self, entries: &[BanEntry]) -> Result<(), StoreError>;

    /// External ids of all auctions currently marked active.
    async fn active_auction_ids(&self) -> Result<HashSet<ExternalId>, StoreError>;

    /// Last known live state of one auction, active or not.
    async fn get_auction(&self, id: ExternalId) -> Result<Option<AuctionRecord>, StoreError>;

    /// Mark a batch of auctions inactive; returns rows changed.
    async fn mark_inactive(&self, ids: &[ExternalId]) -> Result<u64, StoreError>;

    /// Whether a terminal snapshot exists for `id`.
    async fn historical_exists(&self, id: ExternalId) -> Result<bool, StoreError>;

    /// Insert a terminal snapshot unless one exists; returns whether a row
    /// was written.
    async fn insert_historical(&self, snapshot: &HistoricalAuction) -> Result<bool, StoreError>;

    /// Highest archived external id, if any.
    async fn highest_historical_id(&self) -> Result<Option<u64>, StoreError>;
}

#[async_trait]
impl RecordStore for Database {
    async fn upsert_auction(&self, record: &AuctionRecord) -> Result<(), StoreError> {
        bazaar_store::auctions::upsert_auction(self.pool(), record).await
    }

    async fn upsert_highscores(&self, entries: &[HighscoreEntry]) -> Result<(), StoreError> {
        bazaar_store::highscores::replace_entries(self.pool(), entries).await?;
        Ok(())
    }

    async fn upsert_bans(&self, entries: &[BanEntry]) -> Result<(), StoreError> {
        bazaar_store::bans::record_entries(self.pool(), entries).await?;
        Ok(())
    }

    async fn active_auction_ids(&self) -> Result<HashSet<ExternalId>, StoreError> {
        let ids = bazaar_store::auctions::find_active_ids(self.pool()).await?;
        Ok(ids.into_iter().collect())
    }

    async fn get_auction(&self, id: ExternalId) -> Result<Option<AuctionRecord>, StoreError> {
        bazaar_store::auctions::get_auction(self.pool(), id).await
    }

    async fn mark_inactive(&self, ids: &[ExternalId]) -> Result<u64, StoreError> {
        bazaar_store::auctions::mark_inactive(self.pool(), ids).await
    }

    async fn historical_exists(&self, id: ExternalId) -> Result<bool, StoreError> {
        bazaar_store::history::historical_exists(self.pool(), id).await
    }

    async fn insert_historical(&self, snapshot: &HistoricalAuction) -> Result<bool, StoreError> {
        bazaar_store::history::insert_historical(self.pool(), snapshot).await
    }

    async fn highest_historical_id(&self) -> Result<Option<u64>, StoreError> {
        bazaar_store::history::highest_historical_id(self.pool()).await
    }
}
