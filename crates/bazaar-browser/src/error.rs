use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    Chromium(String),

    #[error("failed to launch session: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("challenge did not clear within {timeout_secs}s at {url}")]
    ChallengeTimeout {
        url: String,
        timeout_secs: u64,
    },

    #[error("health probe failed: {0}")]
    HealthProbe(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    /// True for the variant the escalation policy must treat as a blocked
    /// fetch rather than a plain network failure.
    #[must_use]
    pub fn is_challenge_timeout(&self) -> bool {
        matches!(self, Self::ChallengeTimeout { .. })
    }
}
