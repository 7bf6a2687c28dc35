//! Shared types used across the bazaarwatch crates.
//!
//! This module defines the common newtypes and enums that provide type
//! safety and clear domain modeling.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Newtype for the stable identifier the source site assigns to an auction.
///
/// External ids are strictly positive; they drive idempotent upserts and the
/// current/history deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(u64);

impl ExternalId {
    /// Create a new `ExternalId`.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ExternalId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for ExternalId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u64 = s
            .parse()
            .map_err(|_| CoreError::Validation(format!("invalid external id: '{s}'")))?;
        if id == 0 {
            return Err(CoreError::Validation(
                "invalid external id: must be positive".to_string(),
            ));
        }
        Ok(Self(id))
    }
}

/// The kinds of scans the engine can run.
///
/// The kind discriminates checkpoint files, session pool names and the
/// storage tables a scan writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    /// Paginated list of auctions currently open on the site
    CurrentAuctions,
    /// Id-space walk over the site's finished-auction pages
    AuctionHistory,
    /// Leaderboard pages, one per {world, category, vocation} combination
    Highscores,
    /// Per-world ban and world-transfer lists
    BanList,
}

impl ScanKind {
    /// Stable snake_case name, used for checkpoint files and pool names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentAuctions => "current_auctions",
            Self::AuctionHistory => "auction_history",
            Self::Highscores => "highscores",
            Self::BanList => "ban_list",
        }
    }

    /// Default number of concurrently dispatched fetches for this kind.
    ///
    /// List pages tolerate more parallelism than detail pages; the ban list
    /// is a single slow-moving page per world.
    #[must_use]
    pub fn default_batch_size(self) -> usize {
        match self {
            Self::CurrentAuctions => 4,
            Self::AuctionHistory | Self::Highscores => 2,
            Self::BanList => 1,
        }
    }

    /// Whether a completed pass of this kind is followed by reconciliation.
    #[must_use]
    pub fn reconciles(self) -> bool {
        matches!(self, Self::CurrentAuctions)
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current_auctions" | "current" => Ok(Self::CurrentAuctions),
            "auction_history" | "history" => Ok(Self::AuctionHistory),
            "highscores" => Ok(Self::Highscores),
            "ban_list" | "bans" => Ok(Self::BanList),
            other => Err(CoreError::Validation(format!("unknown scan kind: '{other}'"))),
        }
    }
}

/// Leaderboard categories the site publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighscoreCategory {
    /// Total experience points
    Experience,
    /// Magic level
    MagicLevel,
    /// Completed achievement points
    Achievements,
    /// Charm points
    CharmPoints,
}

impl HighscoreCategory {
    /// Query-string value the site expects for this category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Experience => "experience",
            Self::MagicLevel => "magiclevel",
            Self::Achievements => "achievements",
            Self::CharmPoints => "charmpoints",
        }
    }

    /// All categories, in the order the site lists them.
    #[must_use]
    pub fn all() -> &'static [HighscoreCategory] {
        &[
            Self::Experience,
            Self::MagicLevel,
            Self::Achievements,
            Self::CharmPoints,
        ]
    }
}

impl fmt::Display for HighscoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vocation filter applied to a leaderboard page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocationFilter {
    /// No filter
    All,
    /// Druids only
    Druid,
    /// Knights only
    Knight,
    /// Paladins only
    Paladin,
    /// Sorcerers only
    Sorcerer,
}

impl VocationFilter {
    /// Query-string value the site expects for this filter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Druid => "druid",
            Self::Knight => "knight",
            Self::Paladin => "paladin",
            Self::Sorcerer => "sorcerer",
        }
    }
}

impl fmt::Display for VocationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One {world, category, vocation} leaderboard combination.
///
/// A highscores scan enqueues a fixed queue of these; each slice designates
/// exactly one page fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HighscoreSlice {
    /// Game world name
    pub world: String,
    /// Leaderboard category
    pub category: HighscoreCategory,
    /// Vocation filter
    pub vocation: VocationFilter,
}

impl HighscoreSlice {
    /// Build the full combinator queue for a set of worlds.
    #[must_use]
    pub fn combinations(worlds: &[String]) -> Vec<HighscoreSlice> {
        let mut slices = Vec::new();
        for world in worlds {
            for category in HighscoreCategory::all() {
                for vocation in [
                    VocationFilter::All,
                    VocationFilter::Druid,
                    VocationFilter::Knight,
                    VocationFilter::Paladin,
                    VocationFilter::Sorcerer,
                ] {
                    slices.push(HighscoreSlice {
                        world: world.clone(),
                        category: *category,
                        vocation,
                    });
                }
            }
        }
        slices
    }
}

impl fmt::Display for HighscoreSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.world, self.category, self.vocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_parse() {
        let id: ExternalId = "123456".parse().expect("valid id");
        assert_eq!(id.get(), 123_456);
        assert_eq!(id.to_string(), "123456");
    }

    #[test]
    fn test_external_id_invalid() {
        assert!("0".parse::<ExternalId>().is_err());
        assert!("abc".parse::<ExternalId>().is_err());
        assert!("-5".parse::<ExternalId>().is_err());
    }

    #[test]
    fn test_scan_kind_round_trip() {
        for kind in [
            ScanKind::CurrentAuctions,
            ScanKind::AuctionHistory,
            ScanKind::Highscores,
            ScanKind::BanList,
        ] {
            let parsed: ScanKind = kind.as_str().parse().expect("round trip");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_scan_kind_aliases() {
        assert_eq!(
            "history".parse::<ScanKind>().expect("alias"),
            ScanKind::AuctionHistory
        );
        assert_eq!(
            "bans".parse::<ScanKind>().expect("alias"),
            ScanKind::BanList
        );
        assert!("frontier".parse::<ScanKind>().is_err());
    }

    #[test]
    fn test_slice_combinations() {
        let worlds = vec!["Antica".to_string(), "Secura".to_string()];
        let slices = HighscoreSlice::combinations(&worlds);
        // 2 worlds * 4 categories * 5 vocation filters
        assert_eq!(slices.len(), 40);
        assert_eq!(slices[0].world, "Antica");
        assert_eq!(slices[0].to_string(), "Antica/experience/all");
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let json = serde_json::to_string(&ScanKind::CurrentAuctions).expect("serialize");
        assert_eq!(json, "\"current_auctions\"");
    }
}
