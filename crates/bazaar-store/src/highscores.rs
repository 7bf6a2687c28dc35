//! Leaderboard storage.
//!
//! Rows are keyed by (world, category, vocation, rank); each pass replaces
//! the slice it fetched, so the table always holds the latest leaderboard.

use crate::auctions::{as_db_u64, from_db_u64};
use crate::error::Result;
use bazaar_core::HighscoreEntry;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// Upsert every entry of one fetched leaderboard page.
pub async fn replace_entries(pool: &Pool<Sqlite>, entries: &[HighscoreEntry]) -> Result<u64> {
    if entries.is_empty() {
        return Ok(0);
    }

    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0;
    for entry in entries {
        written += sqlx::query(
            "INSERT INTO highscore_entries
                 (world, category, vocation, rank, character, value, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(world, category, vocation, rank) DO UPDATE SET
                 character = excluded.character,
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(&entry.world)
        .bind(entry.category.as_str())
        .bind(entry.vocation.as_str())
        .bind(i64::from(entry.rank))
        .bind(&entry.character)
        .bind(as_db_u64(entry.value))
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;

    Ok(written)
}

/// Count stored entries for one world, across categories.
pub async fn count_for_world(pool: &Pool<Sqlite>, world: &str) -> Result<u64> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM highscore_entries WHERE world = ?")
            .bind(world)
            .fetch_one(pool)
            .await?;

    Ok(from_db_u64(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::connect, migrations::run_migrations};
    use bazaar_core::{HighscoreCategory, VocationFilter};

    fn entry(rank: u32, character: &str, value: u64) -> HighscoreEntry {
        HighscoreEntry {
            world: "Antica".to_string(),
            category: HighscoreCategory::Experience,
            vocation: VocationFilter::All,
            rank,
            character: character.to_string(),
            value,
        }
    }

    #[tokio::test]
    async fn test_replace_updates_ranks_in_place() {
        let pool = connect(":memory:").await.expect("connect");
        run_migrations(&pool).await.expect("migrate");

        replace_entries(&pool, &[entry(1, "Old Leader", 900), entry(2, "Runner Up", 800)])
            .await
            .expect("first pass");
        replace_entries(&pool, &[entry(1, "New Leader", 950)])
            .await
            .expect("second pass");

        assert_eq!(count_for_world(&pool, "Antica").await.expect("count"), 2);

        let (character,): (String,) = sqlx::query_as(
            "SELECT character FROM highscore_entries WHERE world = 'Antica' AND rank = 1",
        )
        .fetch_one(&pool)
        .await
        .expect("row");
        assert_eq!(character, "New Leader");
    }
}
