//! The anti-automation challenge gate.
//!
//! The source site fronts every page with a browser-verification
//! interstitial. The gate navigates and then polls the document title until
//! the interstitial signature disappears; it never tries to defeat the
//! challenge, it only waits for the browser to clear it and for the session
//! cookies to stick.

use crate::error::{BrowserError, Result};
use crate::session::SessionDriver;
use std::time::Duration;
use tokio::time::Instant;

/// Title fragments identifying the interstitial, matched case-insensitively.
const DEFAULT_SIGNATURES: &[&str] = &[
    "just a moment",
    "checking your browser",
    "attention required",
    "verifying you are human",
];

/// Blocks a session on a URL until the challenge clears or a timeout hits.
#[derive(Debug, Clone)]
pub struct ChallengeGate {
    signatures: Vec<String>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ChallengeGate {
    /// Gate with the default interstitial signatures.
    #[must_use]
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            signatures: DEFAULT_SIGNATURES.iter().map(|s| (*s).to_string()).collect(),
            poll_interval,
            timeout,
        }
    }

    /// Override the signature set (one lowercase fragment per entry).
    #[must_use]
    pub fn with_signatures(mut self, signatures: Vec<String>) -> Self {
        self.signatures = signatures;
        self
    }

    /// Whether a document title matches the interstitial signature set.
    #[must_use]
    pub fn is_challenge(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.signatures.iter().any(|sig| title.contains(sig))
    }

    /// Navigate and wait until the page is past the challenge.
    ///
    /// Returns `Ok(())` on the first clean title read. Title read errors are
    /// treated as the challenge still running and retried until the
    /// deadline. On timeout the distinguishable
    /// [`BrowserError::ChallengeTimeout`] is raised so callers can classify
    /// the fetch as blocked rather than failed.
    pub async fn navigate(&self, session: &dyn SessionDriver, url: &str) -> Result<()> {
        session.goto(url).await?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match session.title().await {
                Ok(title) if !self.is_challenge(&title) => return Ok(()),
                Ok(title) => {
                    tracing::debug!(url, title, "Challenge interstitial still up");
                }
                Err(e) => {
                    tracing::debug!(url, "Title read failed while challenged: {}", e);
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(BrowserError::ChallengeTimeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ChallengedDriver {
        clears_after: usize,
        polls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SessionDriver for ChallengedDriver {
        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn content(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn title(&self) -> Result<String> {
            let seen = self.polls.fetch_add(1, Ordering::SeqCst);
            if seen < self.clears_after {
                Ok("Just a moment...".to_string())
            } else {
                Ok("Character Bazaar".to_string())
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn gate_ms(poll: u64, timeout: u64) -> ChallengeGate {
        ChallengeGate::new(Duration::from_millis(poll), Duration::from_millis(timeout))
    }

    #[test]
    fn test_signature_matching() {
        let gate = gate_ms(1, 10);
        assert!(gate.is_challenge("Just a moment..."));
        assert!(gate.is_challenge("JUST A MOMENT"));
        assert!(gate.is_challenge("Attention Required! | Gateway"));
        assert!(!gate.is_challenge("Character Bazaar"));
        assert!(!gate.is_challenge(""));
    }

    #[tokio::test]
    async fn test_navigate_waits_for_clearance() {
        let driver = ChallengedDriver {
            clears_after: 3,
            polls: AtomicUsize::new(0),
        };
        let gate = gate_ms(5, 1_000);
        gate.navigate(&driver, "https://example.com/auction?id=7")
            .await
            .expect("challenge clears");
        assert!(driver.polls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_navigate_times_out_with_distinct_error() {
        let driver = ChallengedDriver {
            clears_after: usize::MAX,
            polls: AtomicUsize::new(0),
        };
        let gate = gate_ms(5, 30);
        let err = gate
            .navigate(&driver, "https://example.com/auction?id=7")
            .await
            .expect_err("never clears");
        assert!(err.is_challenge_timeout());
    }

    #[tokio::test]
    async fn test_navigate_passes_clean_page_immediately() {
        let driver = ChallengedDriver {
            clears_after: 0,
            polls: AtomicUsize::new(0),
        };
        let gate = gate_ms(5, 1_000);
        gate.navigate(&driver, "https://example.com/highscores")
            .await
            .expect("no challenge");
        assert_eq!(driver.polls.load(Ordering::SeqCst), 1);
    }
}
