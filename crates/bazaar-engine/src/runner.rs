//! Top-level scan entry point wiring configuration to the driver.

use crate::driver::ScanDriver;
use crate::error::Result;
use crate::extract::SelectorExtractor;
use crate::fetch::BrowserBackend;
use crate::checkpoint::CheckpointStore;
use crate::limiter::RateLimiter;
use crate::routes::SiteRoutes;
use crate::store::RecordStore;
use crate::types::{RunSummary, ScanOptions};
use bazaar_browser::{ChallengeGate, PoolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Start one scan with production collaborators.
///
/// The pool is looked up (or lazily created) in the injected registry under
/// the scan kind's name, so concurrent scans of different kinds never share
/// sessions.
pub async fn start_scan(
    config: &bazaar_core::AppConfig,
    registry: &PoolRegistry,
    store: Arc<dyn RecordStore>,
    opts: ScanOptions,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    let pool = registry.pool(opts.kind.as_str(), opts.batch_size).await;
    let gate = ChallengeGate::new(
        Duration::from_secs(config.browser.challenge_poll_secs),
        Duration::from_secs(config.browser.challenge_timeout_secs),
    );
    let backend = Arc::new(BrowserBackend::new(
        pool,
        gate,
        Arc::new(SelectorExtractor::new()),
        SiteRoutes::new(config.scanning.base_url.clone()),
    ));

    let driver = ScanDriver::new(
        backend,
        store,
        RateLimiter::new(config.limits.clone()),
        CheckpointStore::new(config.storage.resolved_checkpoint_dir()?),
    );
    driver.run(opts, cancel).await
}
