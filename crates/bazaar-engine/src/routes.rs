//! Target-to-URL mapping for the source site.

use crate::types::ScrapeTarget;

/// Builds page URLs from scrape targets.
#[derive(Debug, Clone)]
pub struct SiteRoutes {
    base_url: String,
}

impl SiteRoutes {
    /// Routes rooted at `base_url` (trailing slash tolerated).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// URL for one scrape target.
    #[must_use]
    pub fn target_url(&self, target: &ScrapeTarget) -> String {
        match target {
            ScrapeTarget::Auction(id) => format!(
                "{}/?subtopic=pastauctions&page=details&auctionid={id}",
                self.base_url
            ),
            ScrapeTarget::AuctionPage(page) => format!(
                "{}/?subtopic=currentauctions&currentpage={page}",
                self.base_url
            ),
            ScrapeTarget::Highscore(slice) => format!(
                "{}/?subtopic=highscores&world={}&category={}&profession={}",
                self.base_url,
                slice.world,
                slice.category.as_str(),
                slice.vocation.as_str()
            ),
            ScrapeTarget::BanPage { world } => {
                format!("{}/?subtopic=banlist&world={world}", self.base_url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{ExternalId, HighscoreCategory, HighscoreSlice, VocationFilter};

    #[test]
    fn test_auction_urls() {
        let routes = SiteRoutes::new("https://secure.example.com/");
        assert_eq!(
            routes.target_url(&ScrapeTarget::Auction(ExternalId::new(88_213))),
            "https://secure.example.com/?subtopic=pastauctions&page=details&auctionid=88213"
        );
        assert_eq!(
            routes.target_url(&ScrapeTarget::AuctionPage(4)),
            "https://secure.example.com/?subtopic=currentauctions&currentpage=4"
        );
    }

    #[test]
    fn test_highscore_and_ban_urls() {
        let routes = SiteRoutes::new("https://secure.example.com");
        let slice = HighscoreSlice {
            world: "Antica".to_string(),
            category: HighscoreCategory::MagicLevel,
            vocation: VocationFilter::Druid,
        };
        assert_eq!(
            routes.target_url(&ScrapeTarget::Highscore(slice)),
            "https://secure.example.com/?subtopic=highscores&world=Antica&category=magiclevel&profession=druid"
        );
        assert_eq!(
            routes.target_url(&ScrapeTarget::BanPage {
                world: "Secura".to_string()
            }),
            "https://secure.example.com/?subtopic=banlist&world=Secura"
        );
    }
}
