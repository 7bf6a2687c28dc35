//! Randomized inter-request delays drawn from named profiles.
//!
//! Each profile maps to a closed-open millisecond band; every call draws a
//! fresh uniform sample. Doubles as the cooldown source for escalation
//! (failure and restart cooldowns are plain fixed sleeps).

use bazaar_core::config::{DelayBand, RateLimitConfig};
use bazaar_core::CoreError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Named delay profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayProfile {
    /// Cheap, low-risk fetches
    Fast,
    /// Default band
    Normal,
    /// Post-pushback crawling
    Slow,
}

impl FromStr for DelayProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "slow" => Ok(Self::Slow),
            other => Err(CoreError::Validation(format!(
                "unknown delay profile: '{other}'"
            ))),
        }
    }
}

/// Stateless delay source; the profile table is the only shared data.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limits: RateLimitConfig,
}

impl RateLimiter {
    /// Build a limiter from the configured bands.
    #[must_use]
    pub fn new(limits: RateLimitConfig) -> Self {
        Self { limits }
    }

    fn band(&self, profile: DelayProfile) -> DelayBand {
        match profile {
            DelayProfile::Fast => self.limits.fast,
            DelayProfile::Normal => self.limits.normal,
            DelayProfile::Slow => self.limits.slow,
        }
    }

    /// Draw one delay uniformly from `[min_ms, max_ms)`.
    #[must_use]
    pub fn delay(&self, profile: DelayProfile) -> Duration {
        let band = self.band(profile);
        let ms = if band.max_ms > band.min_ms {
            rand::thread_rng().gen_range(band.min_ms..band.max_ms)
        } else {
            band.min_ms
        };
        Duration::from_millis(ms)
    }

    /// Sleep for one drawn delay.
    pub async fn throttle(&self, profile: DelayProfile) {
        tokio::time::sleep(self.delay(profile)).await;
    }

    /// Fixed cooldown slept before a session replacement.
    pub async fn failure_cooldown(&self) {
        tokio::time::sleep(Duration::from_secs(self.limits.failure_cooldown_secs)).await;
    }

    /// Fixed cooldown passed to a pool restart.
    #[must_use]
    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs(self.limits.restart_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_stay_within_half_open_band() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        for _ in 0..10_000 {
            let d = limiter.delay(DelayProfile::Fast);
            assert!(d >= Duration::from_millis(500), "below band: {d:?}");
            assert!(d < Duration::from_millis(1_000), "at or above band: {d:?}");
        }
    }

    #[test]
    fn test_degenerate_band_yields_min() {
        let mut limits = RateLimitConfig::default();
        limits.normal = DelayBand {
            min_ms: 250,
            max_ms: 250,
        };
        let limiter = RateLimiter::new(limits);
        assert_eq!(
            limiter.delay(DelayProfile::Normal),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("fast".parse::<DelayProfile>().expect("fast"), DelayProfile::Fast);
        assert_eq!("slow".parse::<DelayProfile>().expect("slow"), DelayProfile::Slow);
        assert!("warp".parse::<DelayProfile>().is_err());
    }
}
