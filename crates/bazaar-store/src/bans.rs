//! Ban and world-transfer list storage.

use crate::auctions::from_db_u64;
use crate::error::Result;
use bazaar_core::BanEntry;
use sqlx::{Pool, Sqlite};

/// Record one page of ban/transfer rows.
///
/// Rows are deduplicated on (world, character, kind); a re-scraped row only
/// refreshes its reason and timestamp.
pub async fn record_entries(pool: &Pool<Sqlite>, entries: &[BanEntry]) -> Result<u64> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut written = 0;
    for entry in entries {
        written += sqlx::query(
            "INSERT INTO ban_entries (id, world, character, kind, reason, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(world, character, kind) DO UPDATE SET
                 reason = excluded.reason,
                 recorded_at = excluded.recorded_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&entry.world)
        .bind(&entry.character)
        .bind(entry.kind.as_str())
        .bind(&entry.reason)
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;

    Ok(written)
}

/// Count stored ban rows for one world.
pub async fn count_for_world(pool: &Pool<Sqlite>, world: &str) -> Result<u64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ban_entries WHERE world = ?")
        .bind(world)
        .fetch_one(pool)
        .await?;

    Ok(from_db_u64(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::connect, migrations::run_migrations};
    use bazaar_core::PenaltyKind;
    use chrono::Utc;

    fn ban(character: &str) -> BanEntry {
        BanEntry {
            world: "Secura".to_string(),
            character: character.to_string(),
            kind: PenaltyKind::Banishment,
            reason: Some("Using unofficial software".to_string()),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_rows_collapse() {
        let pool = connect(":memory:").await.expect("connect");
        run_migrations(&pool).await.expect("migrate");

        record_entries(&pool, &[ban("Cheater One"), ban("Cheater Two")])
            .await
            .expect("first pass");
        record_entries(&pool, &[ban("Cheater One")]).await.expect("second pass");

        assert_eq!(count_for_world(&pool, "Secura").await.expect("count"), 2);
    }
}
