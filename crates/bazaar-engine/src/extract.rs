//! Page extraction: raw page content in, typed records out.
//!
//! Extraction is deliberately pure and isolated behind the [`Extract`]
//! trait; the engine never touches selectors directly, so a site layout
//! change stays contained to this module. `None` means "the target is
//! absent on the site" and is the only way a fetch becomes a not-found.

use crate::types::{Record, ScrapeTarget};
use bazaar_core::{
    AuctionRecord, BanEntry, ExternalId, HighscoreEntry, HighscoreSlice, PenaltyKind,
};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Content was present but did not match the expected layout.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ExtractError {
    /// What was missing or malformed
    pub reason: String,
}

impl ExtractError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Pure page-content extraction for one target kind.
pub trait Extract: Send + Sync {
    /// Convert raw page content into a record, or `None` if the target is
    /// absent on the site.
    fn extract(
        &self,
        content: &str,
        target: &ScrapeTarget,
    ) -> std::result::Result<Option<Record>, ExtractError>;
}

/// Selector-based extractor for the site's server-rendered markup.
#[derive(Debug, Default, Clone)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    /// Create the extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("valid selector")
}

fn text_of(element: &ElementRef, selector: &str) -> Option<String> {
    element
        .select(&sel(selector))
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn number_of(element: &ElementRef, selector: &str) -> Option<u64> {
    let text = text_of(element, selector)?;
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn end_time_of(element: &ElementRef, selector: &str) -> Option<DateTime<Utc>> {
    let epoch: i64 = element
        .select(&sel(selector))
        .next()
        .and_then(|el| el.value().attr("data-time"))
        .and_then(|raw| raw.parse().ok())?;
    DateTime::from_timestamp(epoch, 0)
}

fn parse_auction_element(element: &ElementRef, id: ExternalId) -> Result<AuctionRecord, ExtractError> {
    let character = text_of(element, ".auction-char-name")
        .ok_or_else(|| ExtractError::new(format!("auction {id}: character name missing")))?;
    let world = text_of(element, ".auction-world")
        .ok_or_else(|| ExtractError::new(format!("auction {id}: world missing")))?;
    let level = number_of(element, ".auction-level")
        .ok_or_else(|| ExtractError::new(format!("auction {id}: level missing")))?;
    let vocation = text_of(element, ".auction-vocation")
        .ok_or_else(|| ExtractError::new(format!("auction {id}: vocation missing")))?;
    let minimum_bid = number_of(element, ".auction-minimum-bid")
        .ok_or_else(|| ExtractError::new(format!("auction {id}: minimum bid missing")))?;
    let ends_at = end_time_of(element, ".auction-end")
        .ok_or_else(|| ExtractError::new(format!("auction {id}: end time missing")))?;

    #[allow(clippy::cast_possible_truncation)]
    let level = level as u32;
    Ok(AuctionRecord {
        external_id: id,
        character,
        world,
        level,
        vocation,
        minimum_bid,
        current_bid: number_of(element, ".auction-current-bid"),
        winning_bid: number_of(element, ".auction-winning-bid"),
        ends_at,
    })
}

fn parse_auction_detail(
    document: &Html,
    id: ExternalId,
) -> Result<Option<Record>, ExtractError> {
    if document.select(&sel(".auction-not-found")).next().is_some() {
        return Ok(None);
    }

    let detail = document
        .select(&sel(".auction-detail"))
        .next()
        .ok_or_else(|| ExtractError::new("auction detail container missing"))?;

    parse_auction_element(&detail, id).map(|record| Some(Record::Auction(record)))
}

fn parse_auction_list(document: &Html) -> Result<Option<Record>, ExtractError> {
    document
        .select(&sel(".auction-list"))
        .next()
        .ok_or_else(|| ExtractError::new("auction list container missing"))?;

    let mut records = Vec::new();
    for row in document.select(&sel(".auction-list .auction-row")) {
        let id: u64 = row
            .value()
            .attr("data-auction-id")
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| ExtractError::new("auction row without id attribute"))?;
        records.push(parse_auction_element(&row, ExternalId::new(id))?);
    }

    // A page past the end of the pagination renders an empty list
    if records.is_empty() {
        return Ok(None);
    }
    Ok(Some(Record::AuctionPage(records)))
}

fn parse_highscores(
    document: &Html,
    slice: &HighscoreSlice,
) -> Result<Option<Record>, ExtractError> {
    document
        .select(&sel("table.highscores"))
        .next()
        .ok_or_else(|| ExtractError::new("highscores table missing"))?;

    let mut entries = Vec::new();
    for row in document.select(&sel("table.highscores tbody tr")) {
        let cells: Vec<String> = row
            .select(&sel("td"))
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();
        if cells.len() < 3 {
            return Err(ExtractError::new(format!(
                "highscore row with {} cells, expected rank/name/value",
                cells.len()
            )));
        }

        let rank: u32 = cells[0]
            .parse()
            .map_err(|_| ExtractError::new(format!("bad highscore rank '{}'", cells[0])))?;
        let digits: String = cells[2].chars().filter(char::is_ascii_digit).collect();
        let value: u64 = digits
            .parse()
            .map_err(|_| ExtractError::new(format!("bad highscore value '{}'", cells[2])))?;

        entries.push(HighscoreEntry {
            world: slice.world.clone(),
            category: slice.category,
            vocation: slice.vocation,
            rank,
            character: cells[1].clone(),
            value,
        });
    }

    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(Record::HighscorePage(entries)))
}

fn parse_ban_list(document: &Html, world: &str) -> Result<Option<Record>, ExtractError> {
    document
        .select(&sel("table.banlist"))
        .next()
        .ok_or_else(|| ExtractError::new("ban list table missing"))?;

    let mut entries = Vec::new();
    for row in document.select(&sel("table.banlist tbody tr")) {
        let cells: Vec<String> = row
            .select(&sel("td"))
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();
        if cells.len() < 2 {
            return Err(ExtractError::new(format!(
                "ban row with {} cells, expected name/type[/reason]",
                cells.len()
            )));
        }

        let kind = if cells[1].to_lowercase().contains("transfer") {
            PenaltyKind::WorldTransfer
        } else {
            PenaltyKind::Banishment
        };

        entries.push(BanEntry {
            world: world.to_string(),
            character: cells[0].clone(),
            kind,
            reason: cells.get(2).filter(|r| !r.is_empty()).cloned(),
            recorded_at: Utc::now(),
        });
    }

    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(Record::BanPage(entries)))
}

impl Extract for SelectorExtractor {
    fn extract(
        &self,
        content: &str,
        target: &ScrapeTarget,
    ) -> std::result::Result<Option<Record>, ExtractError> {
        let document = Html::parse_document(content);
        match target {
            ScrapeTarget::Auction(id) => parse_auction_detail(&document, *id),
            ScrapeTarget::AuctionPage(_) => parse_auction_list(&document),
            ScrapeTarget::Highscore(slice) => parse_highscores(&document, slice),
            ScrapeTarget::BanPage { world } => parse_ban_list(&document, world),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{HighscoreCategory, VocationFilter};

    const DETAIL_HTML: &str = r#"
        <div class="auction-detail">
            <div class="auction-char-name">Thorn Redmane</div>
            <div class="auction-world">Antica</div>
            <div class="auction-level">312</div>
            <div class="auction-vocation">Elder Druid</div>
            <div class="auction-minimum-bid">5,000</div>
            <div class="auction-winning-bid">11,500</div>
            <div class="auction-end" data-time="1754000000">ended</div>
        </div>
    "#;

    const LIST_HTML: &str = r#"
        <div class="auction-list">
            <div class="auction-row" data-auction-id="101">
                <div class="auction-char-name">Grim Ledger</div>
                <div class="auction-world">Secura</div>
                <div class="auction-level">188</div>
                <div class="auction-vocation">Royal Paladin</div>
                <div class="auction-minimum-bid">3,000</div>
                <div class="auction-current-bid">4,200</div>
                <div class="auction-end" data-time="1754100000">2 days</div>
            </div>
            <div class="auction-row" data-auction-id="102">
                <div class="auction-char-name">Vex Thunderfall</div>
                <div class="auction-world">Antica</div>
                <div class="auction-level">245</div>
                <div class="auction-vocation">Master Sorcerer</div>
                <div class="auction-minimum-bid">8,000</div>
                <div class="auction-end" data-time="1754100000">2 days</div>
            </div>
        </div>
    "#;

    #[test]
    fn test_detail_page_with_winning_bid() {
        let extractor = SelectorExtractor::new();
        let target = ScrapeTarget::Auction(ExternalId::new(77));
        let record = extractor
            .extract(DETAIL_HTML, &target)
            .expect("parse")
            .expect("found");

        match record {
            Record::Auction(auction) => {
                assert_eq!(auction.external_id, ExternalId::new(77));
                assert_eq!(auction.character, "Thorn Redmane");
                assert_eq!(auction.level, 312);
                assert_eq!(auction.minimum_bid, 5_000);
                assert_eq!(auction.winning_bid, Some(11_500));
            }
            other => panic!("expected auction record, got {other:?}"),
        }
    }

    #[test]
    fn test_detail_page_not_found_marker() {
        let extractor = SelectorExtractor::new();
        let html = r#"<div class="auction-not-found">No auction with this id.</div>"#;
        let result = extractor
            .extract(html, &ScrapeTarget::Auction(ExternalId::new(1)))
            .expect("parse");
        assert!(result.is_none());
    }

    #[test]
    fn test_detail_page_layout_change_is_an_error() {
        let extractor = SelectorExtractor::new();
        // Container renamed upstream: neither marker nor detail matches
        let html = r#"<div class="trade-detail"><div class="name">X</div></div>"#;
        assert!(extractor
            .extract(html, &ScrapeTarget::Auction(ExternalId::new(1)))
            .is_err());
    }

    #[test]
    fn test_list_page_rows() {
        let extractor = SelectorExtractor::new();
        let record = extractor
            .extract(LIST_HTML, &ScrapeTarget::AuctionPage(1))
            .expect("parse")
            .expect("found");

        match record {
            Record::AuctionPage(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].external_id, ExternalId::new(101));
                assert_eq!(rows[0].current_bid, Some(4_200));
                assert_eq!(rows[1].external_id, ExternalId::new(102));
                assert_eq!(rows[1].current_bid, None);
            }
            other => panic!("expected auction page, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_list_page_is_not_found() {
        let extractor = SelectorExtractor::new();
        let html = r#"<div class="auction-list"></div>"#;
        let result = extractor
            .extract(html, &ScrapeTarget::AuctionPage(99))
            .expect("parse");
        assert!(result.is_none());
    }

    #[test]
    fn test_highscore_rows() {
        let extractor = SelectorExtractor::new();
        let html = r#"
            <table class="highscores"><tbody>
                <tr><td>1</td><td>Old Leader</td><td>1,234,567</td></tr>
                <tr><td>2</td><td>Runner Up</td><td>987,654</td></tr>
            </tbody></table>
        "#;
        let slice = HighscoreSlice {
            world: "Antica".to_string(),
            category: HighscoreCategory::Experience,
            vocation: VocationFilter::All,
        };
        let record = extractor
            .extract(html, &ScrapeTarget::Highscore(slice))
            .expect("parse")
            .expect("found");

        match record {
            Record::HighscorePage(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].rank, 1);
                assert_eq!(entries[0].value, 1_234_567);
                assert_eq!(entries[1].character, "Runner Up");
            }
            other => panic!("expected highscore page, got {other:?}"),
        }
    }

    #[test]
    fn test_ban_rows_classify_transfers() {
        let extractor = SelectorExtractor::new();
        let html = r#"
            <table class="banlist"><tbody>
                <tr><td>Cheater One</td><td>Banishment</td><td>Using unofficial software</td></tr>
                <tr><td>Mover Two</td><td>World Transfer</td></tr>
            </tbody></table>
        "#;
        let record = extractor
            .extract(
                html,
                &ScrapeTarget::BanPage {
                    world: "Secura".to_string(),
                },
            )
            .expect("parse")
            .expect("found");

        match record {
            Record::BanPage(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].kind, PenaltyKind::Banishment);
                assert_eq!(
                    entries[0].reason.as_deref(),
                    Some("Using unofficial software")
                );
                assert_eq!(entries[1].kind, PenaltyKind::WorldTransfer);
                assert_eq!(entries[1].reason, None);
            }
            other => panic!("expected ban page, got {other:?}"),
        }
    }
}
