//! The scan state machine.
//!
//! A run moves `INIT → SCANNING → {COMPLETE, ABORTED}`. Inside `SCANNING`
//! the driver walks the scan space in batches of at most K targets:
//! already-present ids are skipped without dispatch, remaining targets are
//! dispatched concurrently (staggered, rate-limited), outcomes are
//! classified, and the checkpoint is persisted once the whole batch has
//! resolved. Its cursor always reflects the batch's upper bound, never a
//! partially-dispatched batch. Hard failures hold the cursor in place and
//! loop through the escalation policy until the targets resolve or the run
//! aborts.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::Result;
use crate::escalation::{EscalationPolicy, RecoveryAction};
use crate::fetch::FetchBackend;
use crate::limiter::{DelayProfile, RateLimiter};
use crate::reconciler::Reconciler;
use crate::store::RecordStore;
use crate::types::{
    AbortReason, FetchOutcome, Record, RunSummary, ScanOptions, ScanSpace, ScrapeTarget,
    StopReason, Termination,
};
use bazaar_core::{ExternalId, HistoricalAuction, ScanKind};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A target's final classification after escalation resolved.
enum Resolved {
    Found(Record),
    NotFound,
}

#[derive(Default)]
struct Persisted {
    saved: u64,
    errors: u64,
}

/// Drives one scan from options to summary.
pub struct ScanDriver {
    backend: Arc<dyn FetchBackend>,
    store: Arc<dyn RecordStore>,
    limiter: RateLimiter,
    checkpoints: CheckpointStore,
}

impl ScanDriver {
    /// Wire a driver over its collaborators.
    #[must_use]
    pub fn new(
        backend: Arc<dyn FetchBackend>,
        store: Arc<dyn RecordStore>,
        limiter: RateLimiter,
        checkpoints: CheckpointStore,
    ) -> Self {
        Self {
            backend,
            store,
            limiter,
            checkpoints,
        }
    }

    /// Run a scan to completion, abort, or cancellation.
    ///
    /// Cancellation is observed between batches; an in-flight batch is
    /// joined and checkpointed first, so resumption re-fetches at most one
    /// batch worth of idempotently-upserted work.
    pub async fn run(&self, opts: ScanOptions, cancel: &CancellationToken) -> Result<RunSummary> {
        let (mut checkpoint, resumed_mid_pass) = self.init_checkpoint(&opts).await?;
        tracing::info!(
            kind = %opts.kind,
            cursor = checkpoint.cursor,
            resumed = opts.resume,
            "Scan started"
        );

        let mut escalation = EscalationPolicy::new(opts.replace_after, opts.restart_after_rounds);
        let mut seen: HashSet<ExternalId> = HashSet::new();
        let mut pending_skips: u32 = 0;
        let mut run_saved: u64 = 0;
        let mut store_errors: u64 = 0;

        let termination = 'scan: loop {
            if cancel.is_cancelled() {
                break 'scan Termination::Aborted(AbortReason::Interrupted);
            }
            if let Some(max) = opts.max_new_items {
                if run_saved >= max {
                    break 'scan Termination::Complete(StopReason::ItemLimit);
                }
            }
            if matches!(opts.space, ScanSpace::Ids { .. })
                && checkpoint.counters.consecutive_not_found >= opts.not_found_ceiling
            {
                break 'scan Termination::Complete(StopReason::NotFoundCeiling);
            }

            // Assemble the next batch, consuming the existing-id fast path
            let mut batch: Vec<(u64, ScrapeTarget)> = Vec::new();
            let mut space_end = false;
            let mut next_cursor = checkpoint.cursor;
            while batch.len() < opts.batch_size.max(1) {
                let Some(target) = Self::target_at(&opts.space, next_cursor) else {
                    space_end = true;
                    break;
                };
                if self.already_present(&opts, &target).await {
                    if !batch.is_empty() {
                        // Keep the cursor behind the unresolved batch; this
                        // skip is recorded on the next round
                        break;
                    }
                    tracing::debug!(%target, "Skipping, already stored");
                    checkpoint.counters.skipped += 1;
                    checkpoint.cursor = Self::advance(&opts.space, next_cursor);
                    checkpoint.touch();
                    pending_skips += 1;
                    if pending_skips >= opts.skip_flush_interval.max(1) {
                        self.checkpoints.save(&checkpoint)?;
                        pending_skips = 0;
                    }
                    next_cursor = checkpoint.cursor;
                    continue;
                }
                batch.push((next_cursor, target));
                next_cursor = Self::advance(&opts.space, next_cursor);
            }

            if batch.is_empty() {
                if space_end {
                    break 'scan Termination::Complete(Self::exhaustion_reason(&opts.space));
                }
                continue;
            }

            // Dispatch and, when needed, escalate until every target resolves
            let mut resolved: Vec<Option<Resolved>> = batch.iter().map(|_| None).collect();
            let mut pending: Vec<usize> = (0..batch.len()).collect();
            while !pending.is_empty() {
                let outcomes = self.dispatch(&batch, &pending, &opts).await;
                let mut failed: Vec<usize> = Vec::new();
                for (&idx, outcome) in pending.iter().zip(outcomes) {
                    match outcome {
                        FetchOutcome::Found(record) => {
                            escalation.record_success();
                            resolved[idx] = Some(Resolved::Found(record));
                        }
                        FetchOutcome::NotFound => {
                            escalation.record_success();
                            resolved[idx] = Some(Resolved::NotFound);
                        }
                        FetchOutcome::Failed(kind) => {
                            tracing::warn!(target = %batch[idx].1, %kind, "Fetch failed");
                            failed.push(idx);
                        }
                        FetchOutcome::Blocked => {
                            tracing::warn!(target = %batch[idx].1, "Fetch blocked by challenge");
                            failed.push(idx);
                        }
                    }
                }
                if failed.is_empty() {
                    break;
                }

                let mut action = RecoveryAction::Retry;
                for _ in &failed {
                    action = action.max(escalation.record_failure());
                }
                match action {
                    RecoveryAction::Retry => {
                        self.limiter.throttle(DelayProfile::Slow).await;
                    }
                    RecoveryAction::ReplaceSession => {
                        tracing::warn!(kind = %opts.kind, "Escalation tier 1: replacing session");
                        self.limiter.failure_cooldown().await;
                        if let Err(e) = self.backend.replace_session().await {
                            tracing::warn!("Session replacement failed: {}", e);
                        }
                    }
                    RecoveryAction::RestartPool => {
                        tracing::warn!(kind = %opts.kind, "Escalation tier 2: restarting pool");
                        if let Err(e) = self
                            .backend
                            .restart_pool(self.limiter.restart_cooldown())
                            .await
                        {
                            tracing::error!("Pool restart failed: {}", e);
                            break 'scan Termination::Aborted(AbortReason::EscalationExhausted);
                        }
                    }
                    RecoveryAction::Abort => {
                        break 'scan Termination::Aborted(AbortReason::EscalationExhausted);
                    }
                }
                if cancel.is_cancelled() {
                    break 'scan Termination::Aborted(AbortReason::Interrupted);
                }
                pending = failed;
            }

            // Whole batch resolved: apply outcomes in cursor order, then
            // persist the checkpoint at the batch's upper bound
            let mut list_end = false;
            for ((cursor, target), outcome) in batch.iter().zip(resolved) {
                let Some(outcome) = outcome else { continue };
                match outcome {
                    Resolved::Found(record) => {
                        let persisted = self.persist(opts.kind, record, &mut seen).await;
                        checkpoint.counters.saved += persisted.saved;
                        run_saved += persisted.saved;
                        store_errors += persisted.errors;
                        checkpoint.counters.consecutive_not_found = 0;
                    }
                    Resolved::NotFound => {
                        tracing::debug!(%target, "Not found");
                        checkpoint.counters.not_found += 1;
                        checkpoint.counters.consecutive_not_found += 1;
                        if matches!(opts.space, ScanSpace::Pages { .. }) {
                            list_end = true;
                        }
                    }
                }
                checkpoint.cursor = Self::advance(&opts.space, *cursor);
            }
            checkpoint.touch();
            self.checkpoints.save(&checkpoint)?;
            pending_skips = 0;

            if list_end {
                break 'scan Termination::Complete(StopReason::SpaceExhausted);
            }
        };

        // Flush before anything else so an abort is always resumable
        checkpoint.touch();
        self.checkpoints.save(&checkpoint)?;

        // Reconciliation needs a seen set covering the whole list; a run
        // resumed mid-pass only saw the tail, so archiving against it would
        // retire auctions that are still live on the earlier pages.
        let reconcile_now =
            termination.is_complete() && opts.kind.reconciles() && !resumed_mid_pass;
        if termination.is_complete() && opts.kind.reconciles() && resumed_mid_pass {
            tracing::info!(
                "Skipping reconciliation after a resumed pass; run a fresh full pass to archive"
            );
        }
        let archived = if reconcile_now {
            match Reconciler::new(Arc::clone(&self.store)).reconcile(&seen).await {
                Ok(outcome) => {
                    if outcome.errors > 0 {
                        tracing::warn!(errors = outcome.errors, "Reconciliation finished with archive gaps");
                    }
                    Some(outcome.archived)
                }
                Err(e) => {
                    tracing::error!("Reconciliation failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if termination.is_complete() {
            self.checkpoints.delete(opts.kind)?;
        }
        if store_errors > 0 {
            tracing::warn!(store_errors, "Scan finished with store write gaps");
        }
        tracing::info!(
            kind = %opts.kind,
            %termination,
            saved = checkpoint.counters.saved,
            not_found = checkpoint.counters.not_found,
            skipped = checkpoint.counters.skipped,
            "Scan finished"
        );

        Ok(RunSummary {
            kind: opts.kind,
            saved: checkpoint.counters.saved,
            skipped: checkpoint.counters.skipped,
            not_found: checkpoint.counters.not_found,
            last_cursor: checkpoint.cursor,
            archived,
            termination,
        })
    }

    async fn init_checkpoint(&self, opts: &ScanOptions) -> Result<(Checkpoint, bool)> {
        if opts.resume {
            if let Some(checkpoint) = self.checkpoints.load(opts.kind)? {
                tracing::info!(
                    kind = %opts.kind,
                    cursor = checkpoint.cursor,
                    "Resuming from checkpoint"
                );
                return Ok((checkpoint, true));
            }
            tracing::info!(kind = %opts.kind, "No checkpoint to resume, starting fresh");
        }

        let cursor = self.initial_cursor(opts).await?;
        Ok((
            Checkpoint::new(opts.kind, cursor, opts.space.direction()),
            false,
        ))
    }

    async fn initial_cursor(&self, opts: &ScanOptions) -> Result<u64> {
        Ok(match &opts.space {
            ScanSpace::Ids { start: Some(s), .. } => *s,
            ScanSpace::Ids { start: None, direction, .. } => {
                let highest = self.store.highest_historical_id().await?;
                match direction {
                    crate::types::ScanDirection::Ascending => highest.map_or(1, |h| h + 1),
                    crate::types::ScanDirection::Descending => highest.unwrap_or(1),
                }
            }
            ScanSpace::Pages { start } => u64::from((*start).max(1)),
            ScanSpace::Slices(_) | ScanSpace::Worlds(_) => 0,
        })
    }

    fn target_at(space: &ScanSpace, cursor: u64) -> Option<ScrapeTarget> {
        match space {
            ScanSpace::Ids { end, direction, .. } => {
                match direction {
                    crate::types::ScanDirection::Ascending => {
                        if let Some(end) = end {
                            if cursor >= *end {
                                return None;
                            }
                        }
                    }
                    crate::types::ScanDirection::Descending => {
                        if cursor == 0 {
                            return None;
                        }
                        if let Some(end) = end {
                            if cursor <= *end {
                                return None;
                            }
                        }
                    }
                }
                Some(ScrapeTarget::Auction(ExternalId::new(cursor)))
            }
            ScanSpace::Pages { .. } => u32::try_from(cursor).ok().map(ScrapeTarget::AuctionPage),
            ScanSpace::Slices(slices) => usize::try_from(cursor)
                .ok()
                .and_then(|i| slices.get(i))
                .cloned()
                .map(ScrapeTarget::Highscore),
            ScanSpace::Worlds(worlds) => usize::try_from(cursor)
                .ok()
                .and_then(|i| worlds.get(i))
                .map(|world| ScrapeTarget::BanPage {
                    world: world.clone(),
                }),
        }
    }

    fn advance(space: &ScanSpace, cursor: u64) -> u64 {
        match space {
            ScanSpace::Ids {
                direction: crate::types::ScanDirection::Descending,
                ..
            } => cursor.saturating_sub(1),
            _ => cursor + 1,
        }
    }

    fn exhaustion_reason(space: &ScanSpace) -> StopReason {
        match space {
            ScanSpace::Ids { .. } => StopReason::BoundReached,
            ScanSpace::Pages { .. } | ScanSpace::Slices(_) | ScanSpace::Worlds(_) => {
                StopReason::SpaceExhausted
            }
        }
    }

    async fn already_present(&self, opts: &ScanOptions, target: &ScrapeTarget) -> bool {
        match target {
            ScrapeTarget::Auction(id) if opts.kind == ScanKind::AuctionHistory => {
                match self.store.historical_exists(*id).await {
                    Ok(exists) => exists,
                    Err(e) => {
                        tracing::warn!(id = %id, "Existence check failed, dispatching anyway: {}", e);
                        false
                    }
                }
            }
            _ => false,
        }
    }

    async fn dispatch(
        &self,
        batch: &[(u64, ScrapeTarget)],
        pending: &[usize],
        opts: &ScanOptions,
    ) -> Vec<FetchOutcome> {
        let futures: Vec<_> = pending
            .iter()
            .enumerate()
            .map(|(pos, &idx)| {
                let target = batch[idx].1.clone();
                let backend = Arc::clone(&self.backend);
                let delay = opts.launch_stagger * u32::try_from(pos).unwrap_or(u32::MAX)
                    + self.limiter.delay(opts.profile);
                async move {
                    tokio::time::sleep(delay).await;
                    backend.fetch(&target).await
                }
            })
            .collect();
        futures::future::join_all(futures).await
    }

    async fn persist(
        &self,
        kind: ScanKind,
        record: Record,
        seen: &mut HashSet<ExternalId>,
    ) -> Persisted {
        let mut persisted = Persisted::default();
        match record {
            Record::Auction(auction) => {
                if kind == ScanKind::AuctionHistory {
                    let snapshot = HistoricalAuction::from_active(&auction, Utc::now());
                    match self.store.insert_historical(&snapshot).await {
                        Ok(true) => persisted.saved += 1,
                        Ok(false) => {}
                        Err(e) => {
                            persisted.errors += 1;
                            tracing::warn!(
                                id = %auction.external_id,
                                "Historical insert failed, skipping: {}",
                                e
                            );
                        }
                    }
                } else {
                    seen.insert(auction.external_id);
                    match self.store.upsert_auction(&auction).await {
                        Ok(()) => persisted.saved += 1,
                        Err(e) => {
                            persisted.errors += 1;
                            tracing::warn!(
                                id = %auction.external_id,
                                "Auction upsert failed, skipping: {}",
                                e
                            );
                        }
                    }
                }
            }
            Record::AuctionPage(rows) => {
                for auction in rows {
                    seen.insert(auction.external_id);
                    match self.store.upsert_auction(&auction).await {
                        Ok(()) => persisted.saved += 1,
                        Err(e) => {
                            persisted.errors += 1;
                            tracing::warn!(
                                id = %auction.external_id,
                                "Auction upsert failed, skipping: {}",
                                e
                            );
                        }
                    }
                }
            }
            Record::HighscorePage(entries) => {
                let count = entries.len() as u64;
                match self.store.upsert_highscores(&entries).await {
                    Ok(()) => persisted.saved += count,
                    Err(e) => {
                        persisted.errors += 1;
                        tracing::warn!("Highscore upsert failed, skipping page: {}", e);
                    }
                }
            }
            Record::BanPage(entries) => {
                let count = entries.len() as u64;
                match self.store.upsert_bans(&entries).await {
                    Ok(()) => persisted.saved += count,
                    Err(e) => {
                        tracing::warn!("Ban upsert failed, skipping page: {}", e);
                        persisted.errors += 1;
                    }
                }
            }
        }
        persisted
    }
}
