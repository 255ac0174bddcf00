use crate::models::{Listing, ListingDetail, Source};
use crate::scrapers::types::ScrapeSummary;
use anyhow::Result;
use async_trait::async_trait;
use url::Url;

/// Common trait for all machinery scrapers
#[async_trait]
pub trait ScraperTrait: Send + Sync {
    /// Run the scrape, writing rows as they arrive
    async fn scrape(&self) -> Result<ScrapeSummary>;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;
}

/// Site-specific selectors for a results page and, optionally, its detail pages
pub trait SiteParser: Send + Sync {
    fn source(&self) -> Source;

    /// Listings on one results page; blocks without a link are skipped
    fn parse_results(&self, html: &str, page_url: &Url) -> Vec<Listing>;

    /// URL of the following results page, `None` on the last one
    fn next_page(&self, html: &str, page_url: &Url) -> Option<String>;

    fn supports_details(&self) -> bool {
        false
    }

    fn parse_detail(&self, _html: &str) -> ListingDetail {
        ListingDetail::unavailable()
    }

    /// Element a browser should wait for before capturing the page
    fn ready_selector(&self) -> Option<&'static str> {
        None
    }
}
