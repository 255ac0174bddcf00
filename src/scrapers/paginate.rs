use crate::fetch::throttle::adaptive_delay;
use crate::fetch::{FetchError, PageSource};
use crate::models::{Listing, ListingDetail};
use crate::output::OutputSink;
use crate::scrapers::traits::SiteParser;
use crate::scrapers::types::{ScrapeOptions, ScrapeSummary, StopReason};
use anyhow::{Context, Result};
use tracing::{info, warn};
use url::Url;

const PAGE_PLACEHOLDER: &str = "{page}";

/// Results URL with a `{page}` slot, for sites that page by index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Option<Self> {
        let template = template.into();
        template
            .contains(PAGE_PLACEHOLDER)
            .then_some(Self { template })
    }

    /// Treat the first all-digit path segment of `url` as the page index.
    /// Returns the template and the index found in `url`.
    pub fn from_numeric_segment(url: &str) -> Option<(Self, u32)> {
        let (without_query, query) = match url.split_once('?') {
            Some((head, tail)) => (head, Some(tail)),
            None => (url, None),
        };

        let mut parts: Vec<&str> = without_query.split('/').collect();
        // scheme, empty, host come first
        let position = parts
            .iter()
            .enumerate()
            .skip(3)
            .find(|(_, part)| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
            .map(|(i, _)| i)?;
        let current = parts[position].parse().ok()?;
        parts[position] = PAGE_PLACEHOLDER;

        let mut template = parts.join("/");
        if let Some(query) = query {
            template.push('?');
            template.push_str(query);
        }
        Some((Self { template }, current))
    }

    pub fn page_url(&self, page: u32) -> String {
        self.template.replace(PAGE_PLACEHOLDER, &page.to_string())
    }
}

/// Walk the results pages of one site, optionally visiting each listing's detail page,
/// and append every page's rows to `sink` before moving on
pub async fn run_listing_pages(
    source: &dyn PageSource,
    parser: &dyn SiteParser,
    options: &ScrapeOptions,
    sink: &mut OutputSink,
) -> Result<ScrapeSummary> {
    let with_details = options.details && parser.supports_details();
    let columns = parser.source().columns(with_details);

    let mut page_url = options.start_url.clone();
    let mut page: u32 = 1;
    let mut pages_done: u32 = 0;
    let mut details_fetched: usize = 0;

    let stop = loop {
        if options.max_pages.map_or(false, |limit| page > limit) {
            info!("Reached the page limit of {}", page - 1);
            break StopReason::PageLimit;
        }

        info!("Scraping page {}: {}", page, page_url);
        let html = match source.fetch_page(&page_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Stopping at page {}: {}", page, e);
                break StopReason::from_error(&e);
            }
        };

        let base = Url::parse(&page_url).with_context(|| format!("Invalid page URL {}", page_url))?;
        let mut listings = parser.parse_results(&html, &base);
        if listings.is_empty() {
            info!("No listings on page {}", page);
            break StopReason::NoMoreResults;
        }
        info!("Found {} listings on page {}", listings.len(), page);

        let mut challenged = false;
        if with_details {
            challenged = fetch_details(source, parser, options, &mut listings, &mut details_fetched).await;
        }

        sink.append(&listings, |l| l.record(&columns))?;
        pages_done += 1;

        if challenged {
            break StopReason::Challenge;
        }

        match parser.next_page(&html, &base) {
            Some(next) if next != page_url => {
                page_url = next;
                page += 1;
                tokio::time::sleep(adaptive_delay(options.min_delay_secs, options.max_delay_secs)).await;
            }
            _ => {
                info!("Reached the last page");
                break StopReason::LastPage;
            }
        }
    };

    let summary = ScrapeSummary {
        source: parser.source().name(),
        pages: pages_done,
        rows: sink.rows(),
        output: sink.path().to_path_buf(),
        stop,
    };
    Ok(summary)
}

/// Returns `true` when an anti-bot challenge cut the detail pass short
async fn fetch_details(
    source: &dyn PageSource,
    parser: &dyn SiteParser,
    options: &ScrapeOptions,
    listings: &mut [Listing],
    details_fetched: &mut usize,
) -> bool {
    let total = listings.len();
    for (i, listing) in listings.iter_mut().enumerate() {
        info!("Fetching details for listing {}/{}", i + 1, total);
        match source.fetch_page(&listing.url).await {
            Ok(html) => listing.apply_detail(parser.parse_detail(&html)),
            Err(e @ FetchError::Challenge { .. }) => {
                // remaining listings keep no detail and render as N/A
                warn!("Detail pages blocked: {}", e);
                return true;
            }
            Err(e) => {
                warn!("Keeping listing without details: {}", e);
                listing.apply_detail(ListingDetail::unavailable());
            }
        }

        *details_fetched += 1;
        if options.refresh_sessions_every > 0 && *details_fetched % options.refresh_sessions_every == 0 {
            source.refresh().await;
        }
        if i + 1 < total {
            tokio::time::sleep(adaptive_delay(options.min_delay_secs, options.max_delay_secs)).await;
        }
    }
    false
}
