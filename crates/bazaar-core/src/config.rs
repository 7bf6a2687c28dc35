//! Configuration management for bazaarwatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// Loaded from `~/.config/bazaarwatch/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan behavior settings
    pub scanning: ScanConfig,
    /// Inter-request delay bands and cooldowns
    pub limits: RateLimitConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Database and checkpoint locations
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from the default path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `BAZAARWATCH_BASE_URL`: Override the site base URL
    /// - `BAZAARWATCH_HEADLESS`: Override browser headless mode (true/false)
    /// - `BAZAARWATCH_DB_PATH`: Override the database file path
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("BAZAARWATCH_BASE_URL") {
            if !val.is_empty() {
                tracing::debug!("Override scanning.base_url from env: {}", val);
                config.scanning.base_url = val;
            }
        }

        if let Ok(val) = std::env::var("BAZAARWATCH_HEADLESS") {
            if let Ok(headless) = val.parse() {
                tracing::debug!("Override browser.headless from env: {}", headless);
                config.browser.headless = headless;
            }
        }

        if let Ok(val) = std::env::var("BAZAARWATCH_DB_PATH") {
            if !val.is_empty() {
                tracing::debug!("Override storage.database_path from env: {}", val);
                config.storage.database_path = Some(PathBuf::from(val));
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/bazaarwatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path (database, checkpoints, session profiles).
    ///
    /// Uses XDG base directories: `~/.local/share/bazaarwatch`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    fn project_dirs() -> ConfigResult<ProjectDirs> {
        ProjectDirs::from("com", "bazaarwatch", "bazaarwatch").ok_or(ConfigError::NoConfigDir)
    }
}

/// Scan behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Base URL of the source site
    pub base_url: String,
    /// Worlds covered by highscore and ban-list scans
    pub worlds: Vec<String>,
    /// Consecutive not-found ceiling terminating an id-space scan
    pub not_found_ceiling: u32,
    /// Consecutive hard failures before a session is replaced (tier 1)
    pub replace_after: u32,
    /// Replacement rounds before the whole pool is restarted (tier 2)
    pub restart_after_rounds: u32,
    /// Per-slot launch stagger within a dispatched batch, in milliseconds
    pub launch_stagger_ms: u64,
    /// Persist every Nth pure-skip event instead of every one
    pub skip_flush_interval: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://secure.bazaar.example.com".to_string(),
            worlds: vec!["Antica".to_string()],
            not_found_ceiling: 100,
            replace_after: 3,
            restart_after_rounds: 2,
            launch_stagger_ms: 400,
            skip_flush_interval: 50,
        }
    }
}

/// One closed-open delay band in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayBand {
    /// Inclusive lower bound
    pub min_ms: u64,
    /// Exclusive upper bound
    pub max_ms: u64,
}

/// Inter-request delay bands and failure cooldowns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Band for cheap, low-risk fetches
    pub fast: DelayBand,
    /// Default band
    pub normal: DelayBand,
    /// Band used when the site has recently pushed back
    pub slow: DelayBand,
    /// Cooldown before a session replacement, in seconds
    pub failure_cooldown_secs: u64,
    /// Cooldown before a full pool restart, in seconds
    pub restart_cooldown_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            fast: DelayBand {
                min_ms: 500,
                max_ms: 1_000,
            },
            normal: DelayBand {
                min_ms: 1_000,
                max_ms: 3_000,
            },
            slow: DelayBand {
                min_ms: 3_000,
                max_ms: 8_000,
            },
            failure_cooldown_secs: 5,
            restart_cooldown_secs: 30,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Upper bound on waiting for the anti-automation challenge to clear
    pub challenge_timeout_secs: u64,
    /// Poll interval while waiting on the challenge, in seconds
    pub challenge_poll_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            challenge_timeout_secs: 90,
            challenge_poll_secs: 2,
        }
    }
}

/// Database and checkpoint locations.
///
/// Unset paths resolve against [`AppConfig::data_dir`] at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file; `data_dir/bazaarwatch.db` when unset
    pub database_path: Option<PathBuf>,
    /// Checkpoint directory; `data_dir/checkpoints` when unset
    pub checkpoint_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database path against the data directory.
    pub fn resolved_database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(AppConfig::data_dir()?.join("bazaarwatch.db")),
        }
    }

    /// Resolve the checkpoint directory against the data directory.
    pub fn resolved_checkpoint_dir(&self) -> ConfigResult<PathBuf> {
        match &self.checkpoint_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(AppConfig::data_dir()?.join("checkpoints")),
        }
    }
}
