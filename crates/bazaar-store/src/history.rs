//! Terminal auction snapshots.
//!
//! `auction_history` is append-only. The primary key on `external_id` is
//! the uniqueness guard behind the at-most-once archival invariant: the
//! reconciler checks existence first, and the `INSERT OR IGNORE` keeps a
//! lost race harmless.

use crate::auctions::{as_db_id, as_db_u64, from_db_u64, parse_ts};
use crate::error::Result;
use bazaar_core::{AuctionOutcome, ExternalId, HistoricalAuction};
use sqlx::{Pool, Sqlite};

/// Whether a historical snapshot exists for `id`.
pub async fn historical_exists(pool: &Pool<Sqlite>, id: ExternalId) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM auction_history WHERE external_id = ?",
    )
    .bind(as_db_id(id))
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Insert a terminal snapshot if none exists yet.
///
/// Returns `true` when a row was written, `false` when the id was already
/// archived.
pub async fn insert_historical(pool: &Pool<Sqlite>, snapshot: &HistoricalAuction) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO auction_history
             (external_id, character, world, level, vocation,
              winning_bid, outcome, ended_at, archived_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(as_db_id(snapshot.external_id))
    .bind(&snapshot.character)
    .bind(&snapshot.world)
    .bind(i64::from(snapshot.level))
    .bind(&snapshot.vocation)
    .bind(snapshot.winning_bid.map(as_db_u64))
    .bind(snapshot.outcome.as_str())
    .bind(snapshot.ended_at.to_rfc3339())
    .bind(snapshot.archived_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetch one snapshot by external id.
pub async fn get_historical(
    pool: &Pool<Sqlite>,
    id: ExternalId,
) -> Result<Option<HistoricalAuction>> {
    let row = sqlx::query_as::<_, (i64, String, String, i64, String, Option<i64>, String, String, String)>(
        "SELECT external_id, character, world, level, vocation,
                winning_bid, outcome, ended_at, archived_at
         FROM auction_history WHERE external_id = ?",
    )
    .bind(as_db_id(id))
    .fetch_optional(pool)
    .await?;

    match row {
        Some((external_id, character, world, level, vocation, winning_bid, outcome, ended_at, archived_at)) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = level as u32;
            Ok(Some(HistoricalAuction {
                external_id: ExternalId::new(from_db_u64(external_id)),
                character,
                world,
                level,
                vocation,
                winning_bid: winning_bid.map(from_db_u64),
                outcome: AuctionOutcome::parse(&outcome),
                ended_at: parse_ts(&ended_at)?,
                archived_at: parse_ts(&archived_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Highest archived external id, if any.
///
/// Id-space scans default to starting one past this.
pub async fn highest_historical_id(pool: &Pool<Sqlite>) -> Result<Option<u64>> {
    let max = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(external_id) FROM auction_history")
        .fetch_one(pool)
        .await?;

    Ok(max.map(from_db_u64))
}
