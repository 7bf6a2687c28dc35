//! Chromium-backed browser sessions.
//!
//! The [`SessionDriver`] and [`SessionLauncher`] traits form the session
//! launch provider seam: the pool and the engine only ever see the traits,
//! so tests can substitute fakes without a Chromium install.

use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use bazaar_core::config::BrowserConfig as BrowserSettings;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::stream::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One live browser session.
///
/// At most one in-flight navigation per driver; the pool enforces exclusive
/// hand-out, so implementations don't need internal locking.
#[async_trait::async_trait]
pub trait SessionDriver: Send + Sync {
    /// Navigate to a URL and wait for the load to settle.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Full page content of the current document.
    async fn content(&self) -> Result<String>;

    /// Title of the current document, empty when the page has none.
    async fn title(&self) -> Result<String>;

    /// Tear the session down, releasing the external process.
    async fn close(&mut self) -> Result<()>;
}

/// Creates sessions for a named pool.
///
/// `slot` is stable across replacements so a relaunched session reuses the
/// same on-disk profile and keeps its challenge-clearance cookies.
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Launch a fresh session for `pool` at `slot`.
    async fn launch(&self, pool: &str, slot: usize) -> Result<Box<dyn SessionDriver>>;
}

/// A Chromium process plus its dedicated page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

#[async_trait::async_trait]
impl SessionDriver for ChromiumSession {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))
    }

    async fn title(&self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| BrowserError::HealthProbe(e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

/// Launches Chromium sessions with persistent per-slot profiles.
pub struct ChromiumLauncher {
    settings: BrowserSettings,
    profile_root: PathBuf,
}

impl ChromiumLauncher {
    /// Create a launcher storing session profiles under `profile_root`.
    #[must_use]
    pub fn new(settings: BrowserSettings, profile_root: PathBuf) -> Self {
        Self {
            settings,
            profile_root,
        }
    }
}

#[async_trait::async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self, pool: &str, slot: usize) -> Result<Box<dyn SessionDriver>> {
        let fingerprint = FingerprintConfig::randomized();
        let profile_dir = self.profile_root.join(pool).join(format!("slot-{slot}"));
        std::fs::create_dir_all(&profile_dir)?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .user_data_dir(&profile_dir)
            .request_timeout(Duration::from_secs(self.settings.navigation_timeout_secs));
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Drain CDP events for the lifetime of the browser
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;
        page.set_user_agent(fingerprint.user_agent.as_str())
            .await
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        tracing::info!(pool, slot, "Launched browser session");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler: handler_task,
        }))
    }
}
