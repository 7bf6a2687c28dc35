//! Bazaarwatch crawl engine.
//!
//! This crate is the crawl orchestration and reconciliation core: it walks
//! identifier and combinator spaces against a challenge-gated site through
//! a pooled browser backend, classifies every fetch, checkpoints progress
//! durably, recovers from sustained failures through a tiered escalation
//! policy, and reconciles the ephemeral "currently listed" record set into
//! permanent history exactly once per item.
//!
//! # Features
//!
//! - Batched concurrent dispatch with per-slot stagger and randomized
//!   inter-request delays
//! - Crash-safe JSON checkpoints with resumable cursors per scan kind
//! - Existing-id fast path and consecutive-not-found termination for
//!   sparse id spaces
//! - Retry → replace session → restart pool → abort recovery hierarchy
//! - Idempotent current→history archival
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_engine::{start_scan, ScanOptions, ScanSpace, ScanDirection};
//! use bazaar_core::ScanKind;
//!
//! let opts = ScanOptions::for_kind(
//!     ScanKind::AuctionHistory,
//!     ScanSpace::Ids { start: None, end: None, direction: ScanDirection::Ascending },
//!     &config,
//! );
//! let summary = start_scan(&config, &registry, store, opts, &cancel).await?;
//! println!("saved {} records", summary.saved);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod checkpoint;
pub mod driver;
pub mod error;
pub mod escalation;
pub mod extract;
pub mod fetch;
pub mod limiter;
pub mod reconciler;
pub mod routes;
pub mod store;
pub mod types;

mod runner;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, CheckpointStore, ScanCounters};
pub use driver::ScanDriver;
pub use error::{Result, ScanError};
pub use escalation::{EscalationPolicy, EscalationTier, RecoveryAction};
pub use extract::{Extract, ExtractError, SelectorExtractor};
pub use fetch::{BrowserBackend, FetchBackend};
pub use limiter::{DelayProfile, RateLimiter};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use routes::SiteRoutes;
pub use runner::start_scan;
pub use store::RecordStore;
pub use types::{
    AbortReason, FailureKind, FetchOutcome, Record, RunSummary, ScanDirection, ScanOptions,
    ScanSpace, ScrapeTarget, StopReason, Termination,
};
