//! Live auction storage.
//!
//! The `auctions` table is the mutable "currently listed" record set, keyed
//! by the site's external id. Upserts are last-write-wins so re-fetching an
//! auction after an interrupted scan is harmless.

use crate::error::{Result, StoreError};
use bazaar_core::{AuctionRecord, ExternalId};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn as_db_id(id: ExternalId) -> i64 {
    id.get() as i64
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn as_db_u64(value: u64) -> i64 {
    value as i64
}

#[allow(clippy::cast_sign_loss)]
pub(crate) fn from_db_u64(value: i64) -> u64 {
    value as u64
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("invalid timestamp '{s}': {e}")))
}

/// Insert or update a live auction, marking it active.
///
/// # Errors
/// Returns `StoreError` if the upsert fails.
pub async fn upsert_auction(pool: &Pool<Sqlite>, record: &AuctionRecord) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO auctions (external_id, character, world, level, vocation,
                               minimum_bid, current_bid, winning_bid, ends_at,
                               active, first_seen, last_seen)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
         ON CONFLICT(external_id) DO UPDATE SET
             character = excluded.character,
             world = excluded.world,
             level = excluded.level,
             vocation = excluded.vocation,
             minimum_bid = excluded.minimum_bid,
             current_bid = excluded.current_bid,
             winning_bid = excluded.winning_bid,
             ends_at = excluded.ends_at,
             active = 1,
             last_seen = excluded.last_seen",
    )
    .bind(as_db_id(record.external_id))
    .bind(&record.character)
    .bind(&record.world)
    .bind(i64::from(record.level))
    .bind(&record.vocation)
    .bind(as_db_u64(record.minimum_bid))
    .bind(record.current_bid.map(as_db_u64))
    .bind(record.winning_bid.map(as_db_u64))
    .bind(record.ends_at.to_rfc3339())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// All external ids currently marked active.
pub async fn find_active_ids(pool: &Pool<Sqlite>) -> Result<Vec<ExternalId>> {
    let rows = sqlx::query_as::<_, (i64,)>("SELECT external_id FROM auctions WHERE active = 1")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id,)| ExternalId::new(from_db_u64(id)))
        .collect())
}

/// Mark a batch of auctions inactive; returns the number of rows changed.
pub async fn mark_inactive(pool: &Pool<Sqlite>, ids: &[ExternalId]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut changed = 0;
    for id in ids {
        changed += sqlx::query("UPDATE auctions SET active = 0 WHERE external_id = ?")
            .bind(as_db_id(*id))
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;

    Ok(changed)
}

/// Fetch one auction row by external id, active or not.
pub async fn get_auction(pool: &Pool<Sqlite>, id: ExternalId) -> Result<Option<AuctionRecord>> {
    let row = sqlx::query_as::<_, (i64, String, String, i64, String, i64, Option<i64>, Option<i64>, String)>(
        "SELECT external_id, character, world, level, vocation,
                minimum_bid, current_bid, winning_bid, ends_at
         FROM auctions WHERE external_id = ?",
    )
    .bind(as_db_id(id))
    .fetch_optional(pool)
    .await?;

    match row {
        Some((
            external_id,
            character,
            world,
            level,
            vocation,
            minimum_bid,
            current_bid,
            winning_bid,
            ends_at,
        )) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = level as u32;
            Ok(Some(AuctionRecord {
                external_id: ExternalId::new(from_db_u64(external_id)),
                character,
                world,
                level,
                vocation,
                minimum_bid: from_db_u64(minimum_bid),
                current_bid: current_bid.map(from_db_u64),
                winning_bid: winning_bid.map(from_db_u64),
                ends_at: parse_ts(&ends_at)?,
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::connect, migrations::run_migrations};

    async fn test_pool() -> Pool<Sqlite> {
        let pool = connect(":memory:").await.expect("connect");
        run_migrations(&pool).await.expect("migrate");
        pool
    }

    fn auction(id: u64, current_bid: Option<u64>) -> AuctionRecord {
        AuctionRecord {
            external_id: ExternalId::new(id),
            character: "Grim Ledger".to_string(),
            world: "Antica".to_string(),
            level: 188,
            vocation: "Royal Paladin".to_string(),
            minimum_bid: 3_000,
            current_bid,
            winning_bid: None,
            ends_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_last_write_wins() {
        let pool = test_pool().await;

        upsert_auction(&pool, &auction(10, None)).await.expect("insert");
        upsert_auction(&pool, &auction(10, Some(4_500))).await.expect("update");

        let stored = get_auction(&pool, ExternalId::new(10))
            .await
            .expect("query")
            .expect("present");
        assert_eq!(stored.current_bid, Some(4_500));

        let active = find_active_ids(&pool).await.expect("active");
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_inactive_batch() {
        let pool = test_pool().await;
        for id in [1_u64, 2, 3] {
            upsert_auction(&pool, &auction(id, None)).await.expect("insert");
        }

        let changed = mark_inactive(&pool, &[ExternalId::new(1), ExternalId::new(3)])
            .await
            .expect("deactivate");
        assert_eq!(changed, 2);

        let active = find_active_ids(&pool).await.expect("active");
        assert_eq!(active, vec![ExternalId::new(2)]);
    }

    #[tokio::test]
    async fn test_reupsert_reactivates() {
        let pool = test_pool().await;
        upsert_auction(&pool, &auction(7, None)).await.expect("insert");
        mark_inactive(&pool, &[ExternalId::new(7)]).await.expect("deactivate");

        upsert_auction(&pool, &auction(7, Some(100))).await.expect("reinsert");
        let active = find_active_ids(&pool).await.expect("active");
        assert_eq!(active, vec![ExternalId::new(7)]);
    }
}
