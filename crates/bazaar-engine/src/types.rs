//! Engine-level types: targets, outcomes, scan spaces and run summaries.

use bazaar_core::{
    AppConfig, AuctionRecord, BanEntry, ExternalId, HighscoreEntry, HighscoreSlice, ScanKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::limiter::DelayProfile;

/// One unit of fetch work. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeTarget {
    /// A finished-auction detail page addressed by external id
    Auction(ExternalId),
    /// One page of the current-auction list
    AuctionPage(u32),
    /// One {world, category, vocation} leaderboard page
    Highscore(HighscoreSlice),
    /// One world's ban/transfer list
    BanPage {
        /// Game world name
        world: String,
    },
}

impl ScrapeTarget {
    /// The scan kind this target belongs to.
    #[must_use]
    pub fn kind(&self) -> ScanKind {
        match self {
            Self::Auction(_) => ScanKind::AuctionHistory,
            Self::AuctionPage(_) => ScanKind::CurrentAuctions,
            Self::Highscore(_) => ScanKind::Highscores,
            Self::BanPage { .. } => ScanKind::BanList,
        }
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auction(id) => write!(f, "auction {id}"),
            Self::AuctionPage(page) => write!(f, "auction list page {page}"),
            Self::Highscore(slice) => write!(f, "highscores {slice}"),
            Self::BanPage { world } => write!(f, "ban list {world}"),
        }
    }
}

/// Typed payload extracted from one fetched page.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A single auction (detail page)
    Auction(AuctionRecord),
    /// All auctions on one list page
    AuctionPage(Vec<AuctionRecord>),
    /// All rows of one leaderboard page
    HighscorePage(Vec<HighscoreEntry>),
    /// All rows of one ban-list page
    BanPage(Vec<BanEntry>),
}

/// Classes of hard fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Navigation, transport or session failure
    Network,
    /// Content was present but unparsable (likely an upstream layout change)
    Extraction,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Extraction => write!(f, "extraction"),
        }
    }
}

/// Result of executing one target. Exactly one tag per outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The target exists and parsed into a record
    Found(Record),
    /// The target is absent on the site (soft; drives termination heuristics)
    NotFound,
    /// The fetch failed hard (drives escalation)
    Failed(FailureKind),
    /// The challenge gate did not clear (drives escalation)
    Blocked,
}

/// Direction of travel over an id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Increasing ids
    Ascending,
    /// Decreasing ids
    Descending,
}

/// The identifier or combinator space a scan walks.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanSpace {
    /// Numeric id space.
    Ids {
        /// First id to fetch; defaults to one past the highest known id
        /// (ascending) or the highest known id (descending)
        start: Option<u64>,
        /// Exclusive stop bound
        end: Option<u64>,
        /// Direction of travel
        direction: ScanDirection,
    },
    /// List pagination, walked until the first empty page.
    Pages {
        /// First page number (the site counts from 1)
        start: u32,
    },
    /// Fixed queue of leaderboard combinators.
    Slices(Vec<HighscoreSlice>),
    /// Fixed queue of world ban lists.
    Worlds(Vec<String>),
}

impl ScanSpace {
    /// Direction of travel; non-id spaces always walk forward.
    #[must_use]
    pub fn direction(&self) -> ScanDirection {
        match self {
            Self::Ids { direction, .. } => *direction,
            _ => ScanDirection::Ascending,
        }
    }
}

/// Per-run options accepted by [`crate::driver::ScanDriver::run`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// What to scan
    pub kind: ScanKind,
    /// The space to walk
    pub space: ScanSpace,
    /// Resume from a persisted checkpoint instead of starting fresh
    pub resume: bool,
    /// Stop after saving this many new items (unbounded when `None`)
    pub max_new_items: Option<u64>,
    /// Consecutive not-found ceiling for id-space scans
    pub not_found_ceiling: u32,
    /// Delay profile applied before each dispatch
    pub profile: DelayProfile,
    /// Maximum concurrently dispatched fetches (pool size K)
    pub batch_size: usize,
    /// Per-slot launch stagger within a batch
    pub launch_stagger: Duration,
    /// Consecutive hard failures before a session replacement (E1)
    pub replace_after: u32,
    /// Replacement rounds before a pool restart (R1)
    pub restart_after_rounds: u32,
    /// Persist every Nth pure-skip event
    pub skip_flush_interval: u32,
}

impl ScanOptions {
    /// Options for `kind` over `space` with defaults from configuration.
    #[must_use]
    pub fn for_kind(kind: ScanKind, space: ScanSpace, config: &AppConfig) -> Self {
        Self {
            kind,
            space,
            resume: false,
            max_new_items: None,
            not_found_ceiling: config.scanning.not_found_ceiling,
            profile: DelayProfile::Normal,
            batch_size: kind.default_batch_size(),
            launch_stagger: Duration::from_millis(config.scanning.launch_stagger_ms),
            replace_after: config.scanning.replace_after,
            restart_after_rounds: config.scanning.restart_after_rounds,
            skip_flush_interval: config.scanning.skip_flush_interval,
        }
    }
}

/// Why a scan stopped normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A combinator queue or list pagination ran out
    SpaceExhausted,
    /// The configured id bound was reached
    BoundReached,
    /// The max-new-items limit was reached
    ItemLimit,
    /// The consecutive not-found ceiling tripped
    NotFoundCeiling,
}

/// Why a scan aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Tier-2 escalation failed to restore a working session pool
    EscalationExhausted,
    /// The operator cancelled the run
    Interrupted,
}

/// Terminal state of a scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The scan ran to a normal stop condition
    Complete(StopReason),
    /// The scan gave up; re-invoke with resume to continue
    Aborted(AbortReason),
}

impl Termination {
    /// True for the `Complete` arm.
    #[must_use]
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete(StopReason::SpaceExhausted) => write!(f, "complete (space exhausted)"),
            Self::Complete(StopReason::BoundReached) => write!(f, "complete (bound reached)"),
            Self::Complete(StopReason::ItemLimit) => write!(f, "complete (item limit)"),
            Self::Complete(StopReason::NotFoundCeiling) => {
                write!(f, "complete (not-found ceiling)")
            }
            Self::Aborted(AbortReason::EscalationExhausted) => {
                write!(f, "aborted (escalation exhausted)")
            }
            Self::Aborted(AbortReason::Interrupted) => write!(f, "aborted (interrupted)"),
        }
    }
}

/// What one scan run did, reported to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scan kind
    pub kind: ScanKind,
    /// Records saved (new historical rows, or upserted list entries)
    pub saved: u64,
    /// Targets skipped as already present
    pub skipped: u64,
    /// Targets absent on the site
    pub not_found: u64,
    /// Cursor after the last fully-resolved batch
    pub last_cursor: u64,
    /// Auctions archived by the reconciliation pass, when one ran
    pub archived: Option<u64>,
    /// Terminal state
    pub termination: Termination,
}
