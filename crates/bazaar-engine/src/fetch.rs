//! The fetch boundary between the scan driver and the browser layer.
//!
//! [`FetchBackend`] is the seam the escalation policy acts through: fetch
//! one target, replace one session, restart the pool. The production
//! implementation folds browser and extraction errors into
//! [`FetchOutcome`] tags at this boundary, so hard failures never propagate
//! as exceptions during normal operation.

use crate::error::Result;
use crate::extract::Extract;
use crate::routes::SiteRoutes;
use crate::types::{FailureKind, FetchOutcome, ScrapeTarget};
use async_trait::async_trait;
use bazaar_browser::{ChallengeGate, SessionPool};
use std::sync::Arc;
use std::time::Duration;

/// Executes targets against the source site.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    /// Fetch and classify one target.
    async fn fetch(&self, target: &ScrapeTarget) -> FetchOutcome;

    /// Tier-1 recovery: swap out one session.
    async fn replace_session(&self) -> Result<()>;

    /// Tier-2 recovery: tear down and relaunch the pool after `cooldown`.
    async fn restart_pool(&self, cooldown: Duration) -> Result<()>;
}

/// Browser-backed fetching: session pool + challenge gate + extraction.
pub struct BrowserBackend {
    pool: Arc<SessionPool>,
    gate: ChallengeGate,
    extractor: Arc<dyn Extract>,
    routes: SiteRoutes,
}

impl BrowserBackend {
    /// Wire a backend for one scan's pool.
    #[must_use]
    pub fn new(
        pool: Arc<SessionPool>,
        gate: ChallengeGate,
        extractor: Arc<dyn Extract>,
        routes: SiteRoutes,
    ) -> Self {
        Self {
            pool,
            gate,
            extractor,
            routes,
        }
    }
}

#[async_trait]
impl FetchBackend for BrowserBackend {
    async fn fetch(&self, target: &ScrapeTarget) -> FetchOutcome {
        let url = self.routes.target_url(target);

        let mut handle = match self.pool.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(%target, "Session acquisition failed: {}", e);
                return FetchOutcome::Failed(FailureKind::Network);
            }
        };

        let outcome = match self.gate.navigate(handle.driver(), &url).await {
            Err(e) if e.is_challenge_timeout() => {
                tracing::warn!(%target, "Challenge gate timed out");
                handle.mark_degraded();
                FetchOutcome::Blocked
            }
            Err(e) => {
                tracing::warn!(%target, "Navigation failed: {}", e);
                handle.mark_degraded();
                FetchOutcome::Failed(FailureKind::Network)
            }
            Ok(()) => match handle.driver().content().await {
                Err(e) => {
                    tracing::warn!(%target, "Content read failed: {}", e);
                    handle.mark_degraded();
                    FetchOutcome::Failed(FailureKind::Network)
                }
                Ok(content) => match self.extractor.extract(&content, target) {
                    Ok(Some(record)) => FetchOutcome::Found(record),
                    Ok(None) => FetchOutcome::NotFound,
                    Err(e) => {
                        let sample: String = content.chars().take(240).collect();
                        tracing::error!(
                            %target,
                            sample,
                            "Extraction failed ({}); upstream layout change?",
                            e
                        );
                        FetchOutcome::Failed(FailureKind::Extraction)
                    }
                },
            },
        };

        self.pool.release(handle).await;
        outcome
    }

    async fn replace_session(&self) -> Result<()> {
        self.pool.replace_one().await.map_err(Into::into)
    }

    async fn restart_pool(&self, cooldown: Duration) -> Result<()> {
        self.pool.restart(cooldown).await.map_err(Into::into)
    }
}
