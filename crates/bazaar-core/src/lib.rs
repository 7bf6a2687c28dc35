//! Bazaar Core - Foundation crate for the bazaarwatch scraper.
//!
//! This crate provides the shared types, error handling and configuration
//! management that all other bazaarwatch crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`ExternalId`, `ScanKind`, `HighscoreSlice`)
//! - [`record`] - Scraped record structs (auctions, highscores, ban entries)
//!
//! # Example
//!
//! ```rust
//! use bazaar_core::{AppConfig, ScanKind};
//!
//! let config = AppConfig::default();
//! assert!(config.browser.headless);
//! assert_eq!(ScanKind::AuctionHistory.as_str(), "auction_history");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod record;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, DelayBand, RateLimitConfig, ScanConfig, StorageConfig};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use record::{
    AuctionOutcome, AuctionRecord, BanEntry, HighscoreEntry, HistoricalAuction, PenaltyKind,
};
pub use types::{ExternalId, HighscoreCategory, HighscoreSlice, ScanKind, VocationFilter};
