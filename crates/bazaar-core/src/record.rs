//! Scraped record structs shared between the engine and the store.

use crate::types::{ExternalId, HighscoreCategory, VocationFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live auction as currently listed on the site.
///
/// Mutable between passes: the current bid moves while the auction is open.
/// Keyed by [`ExternalId`] with last-write-wins semantics on upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Stable id assigned by the source site
    pub external_id: ExternalId,
    /// Character being auctioned
    pub character: String,
    /// Game world the character lives on
    pub world: String,
    /// Character level at listing time
    pub level: u32,
    /// Vocation as displayed by the site
    pub vocation: String,
    /// Minimum bid set by the seller
    pub minimum_bid: u64,
    /// Highest bid observed so far, if any
    pub current_bid: Option<u64>,
    /// Winning bid, populated on finished-auction pages
    pub winning_bid: Option<u64>,
    /// When the auction ends (or ended)
    pub ends_at: DateTime<Utc>,
}

/// How an auction left the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionOutcome {
    /// A bid was accepted before the deadline
    Finished,
    /// The auction lapsed without a winning bid
    Expired,
}

impl AuctionOutcome {
    /// Stable string used in the history table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Expired => "expired",
        }
    }

    /// Parse from the stored string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "finished" => Self::Finished,
            _ => Self::Expired,
        }
    }
}

/// Terminal snapshot of an auction, moved into history exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAuction {
    /// Stable id assigned by the source site
    pub external_id: ExternalId,
    /// Character that was auctioned
    pub character: String,
    /// Game world
    pub world: String,
    /// Character level at the end of the auction
    pub level: u32,
    /// Vocation as displayed by the site
    pub vocation: String,
    /// Winning bid, absent for expired auctions
    pub winning_bid: Option<u64>,
    /// Inferred outcome
    pub outcome: AuctionOutcome,
    /// When the auction ended
    pub ended_at: DateTime<Utc>,
    /// When this snapshot was archived
    pub archived_at: DateTime<Utc>,
}

impl HistoricalAuction {
    /// Derive a terminal snapshot from the last known live state.
    ///
    /// The site publishes no authoritative terminal status for auctions that
    /// simply vanish from the current list. A non-empty winning-bid field is
    /// taken to mean the auction finished with a sale; anything else is
    /// recorded as expired. Best-effort inference, not ground truth.
    #[must_use]
    pub fn from_active(record: &AuctionRecord, archived_at: DateTime<Utc>) -> Self {
        let outcome = if record.winning_bid.is_some() {
            AuctionOutcome::Finished
        } else {
            AuctionOutcome::Expired
        };
        Self {
            external_id: record.external_id,
            character: record.character.clone(),
            world: record.world.clone(),
            level: record.level,
            vocation: record.vocation.clone(),
            winning_bid: record.winning_bid,
            outcome,
            ended_at: record.ends_at,
            archived_at,
        }
    }
}

/// One row of a leaderboard page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighscoreEntry {
    /// Game world
    pub world: String,
    /// Leaderboard category
    pub category: HighscoreCategory,
    /// Vocation filter the page was fetched with
    pub vocation: VocationFilter,
    /// Rank within the page's leaderboard
    pub rank: u32,
    /// Character name
    pub character: String,
    /// Score value (experience points, level, charm points, ...)
    pub value: u64,
}

/// The penalty classes the site's ban list mixes into one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    /// Temporary or permanent banishment
    Banishment,
    /// Forced world transfer
    WorldTransfer,
}

impl PenaltyKind {
    /// Stable string used in the ban table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banishment => "banishment",
            Self::WorldTransfer => "world_transfer",
        }
    }
}

/// One row of a per-world ban/transfer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanEntry {
    /// Game world
    pub world: String,
    /// Penalized character
    pub character: String,
    /// Penalty class
    pub kind: PenaltyKind,
    /// Reason text as displayed, if any
    pub reason: Option<String>,
    /// When the row was scraped
    pub recorded_at: DateTime<Utc>,
}
