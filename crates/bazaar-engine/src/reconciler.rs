//! The current→history reconciliation pass.
//!
//! After a full list-style pass, every auction that is active in the store
//! but was not seen on the site has ended. Each ended auction gets a
//! terminal snapshot exactly once (existence check plus the history table's
//! uniqueness guard), then the whole batch is marked inactive. A snapshot
//! that fails to derive or write is logged and skipped; deactivation still
//! runs, so the gap surfaces in error counts instead of wedging the pass.

use crate::error::Result;
use crate::store::RecordStore;
use bazaar_core::{ExternalId, HistoricalAuction};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Terminal snapshots written
    pub archived: u64,
    /// Rows marked inactive
    pub deactivated: u64,
    /// Snapshots that failed to derive or write
    pub errors: u64,
}

/// Diffs the seen set against active rows and archives the difference.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
}

impl Reconciler {
    /// Reconciler over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Archive and deactivate every active auction absent from `seen`.
    pub async fn reconcile(&self, seen: &HashSet<ExternalId>) -> Result<ReconcileOutcome> {
        let active = self.store.active_auction_ids().await?;
        let mut ended: Vec<ExternalId> = active.difference(seen).copied().collect();
        ended.sort_unstable();

        if ended.is_empty() {
            tracing::info!("Reconciliation: nothing ended since the last pass");
            return Ok(ReconcileOutcome::default());
        }
        tracing::info!(
            ended = ended.len(),
            seen = seen.len(),
            "Reconciliation: archiving ended auctions"
        );

        let mut outcome = ReconcileOutcome::default();
        for id in &ended {
            match self.archive_one(*id).await {
                Ok(true) => outcome.archived += 1,
                Ok(false) => {}
                Err(e) => {
                    outcome.errors += 1;
                    tracing::warn!(id = %id, "Archiving failed, skipping: {}", e);
                }
            }
        }

        // Deactivation runs regardless of individual archive failures
        outcome.deactivated = self.store.mark_inactive(&ended).await?;
        Ok(outcome)
    }

    async fn archive_one(&self, id: ExternalId) -> Result<bool> {
        if self.store.historical_exists(id).await? {
            return Ok(false);
        }

        let Some(record) = self.store.get_auction(id).await? else {
            tracing::warn!(id = %id, "Active id without a stored row; nothing to archive");
            return Ok(false);
        };

        let snapshot = HistoricalAuction::from_active(&record, Utc::now());
        Ok(self.store.insert_historical(&snapshot).await?)
    }
}
