//! Browser session management for the challenge-gated source site.
//!
//! Provides headless Chromium sessions with persistent cookie profiles, a
//! health-checked session pool keyed by pool name, and the challenge gate
//! that blocks until the site's anti-automation interstitial clears.

pub mod challenge;
pub mod error;
pub mod fingerprint;
pub mod pool;
pub mod session;

pub use challenge::ChallengeGate;
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use pool::{PoolRegistry, SessionHandle, SessionHealth, SessionPool};
pub use session::{ChromiumLauncher, SessionDriver, SessionLauncher};
