use crate::config::{DealersConfig, HttpConfig, OutputConfig};
use crate::fetch::throttle::adaptive_delay;
use crate::fetch::{FetchError, PageSource};
use crate::models::{Dealer, DealerAddress};
use crate::output::OutputSink;
use crate::scrapers::html::{element_text, first_text, selector};
use crate::scrapers::paginate::UrlTemplate;
use crate::scrapers::traits::ScraperTrait;
use crate::scrapers::types::{ScrapeSummary, StopReason};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const BASE_URL: &str = "https://www.agriaffaires.co.uk";

const ALL_ADDRESSES: &str = "All addresses";

/// Headers and cookie that pin the directory to its UK edition
pub fn pin_uk_edition(http: &mut HttpConfig) {
    let headers = [
        ("Accept-Language", "en-GB,en;q=0.5"),
        ("CF-IPCountry", "GB"),
    ];
    for (name, value) in headers {
        http.extra_headers
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
    if !http.cookies.iter().any(|c| c.starts_with("country_code=")) {
        http.cookies.push("country_code=gb".to_string());
    }
}

/// Agriaffaires dealer directory for one country, including each dealer's address page
pub struct DealerScraper {
    source: Arc<dyn PageSource>,
    base_url: String,
    config: DealersConfig,
    output: OutputConfig,
}

impl DealerScraper {
    pub fn new(source: Arc<dyn PageSource>, config: DealersConfig, output: OutputConfig) -> Self {
        Self::with_base_url(source, BASE_URL, config, output)
    }

    pub fn with_base_url(
        source: Arc<dyn PageSource>,
        base_url: &str,
        config: DealersConfig,
        output: OutputConfig,
    ) -> Self {
        Self {
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            output,
        }
    }

    fn listing_template(&self) -> Result<UrlTemplate> {
        UrlTemplate::new(format!(
            "{}{}",
            self.base_url,
            directory_path("{page}", &self.config.country)
        ))
        .context("Dealer directory URL has no page slot")
    }

    async fn pause(&self) {
        tokio::time::sleep(adaptive_delay(self.config.min_delay_secs, self.config.max_delay_secs)).await;
    }

    /// Fill in addresses from each dealer's own page.
    /// Returns `true` if a challenge stopped the pass.
    async fn fetch_addresses(&self, dealers: &mut [Dealer]) -> bool {
        let total = dealers.len();
        for (i, dealer) in dealers.iter_mut().enumerate() {
            if dealer.url.is_empty() {
                continue;
            }

            match self.source.fetch_page(&dealer.url).await {
                Ok(html) => {
                    let (main, others) = parse_dealer_page(&html);
                    dealer.main_address = main;
                    dealer.addresses = others;
                    info!("Scraped: {} ({})", dealer.name, dealer.url);
                }
                Err(e @ FetchError::Challenge { .. }) => {
                    warn!("Dealer pages blocked: {}", e);
                    return true;
                }
                Err(e) => warn!("Keeping {} without addresses: {}", dealer.name, e),
            }

            if i + 1 < total {
                self.pause().await;
            }
        }
        false
    }
}

#[async_trait]
impl ScraperTrait for DealerScraper {
    async fn scrape(&self) -> Result<ScrapeSummary> {
        let template = self.listing_template()?;
        let base = Url::parse(&self.base_url).with_context(|| format!("Invalid base URL {}", self.base_url))?;
        let suffix = format!("dealers_{}", self.config.country);
        let mut sink = OutputSink::create(
            &self.output.results_dir,
            &suffix,
            self.output.format,
            &Dealer::HEADERS,
        )?;

        let mut page: u32 = 1;
        let mut pages_done: u32 = 0;

        let stop = loop {
            if self.config.max_pages.map_or(false, |limit| page > limit) {
                info!("Reached the page limit of {}", page - 1);
                break StopReason::PageLimit;
            }

            let url = template.page_url(page);
            info!("Scraping page {}: {}", page, url);
            let html = match self.source.fetch_page(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Error fetching page {}: {}", page, e);
                    break StopReason::from_error(&e);
                }
            };

            let mut dealers = parse_dealer_blocks(&html, &base);
            if dealers.is_empty() {
                info!("No dealer blocks found on page {}. Stopping.", page);
                break StopReason::NoMoreResults;
            }
            info!("Found {} dealers on page {}", dealers.len(), page);

            let challenged = self.fetch_addresses(&mut dealers).await;
            sink.append(&dealers, Dealer::record)?;
            pages_done += 1;

            if challenged {
                break StopReason::Challenge;
            }
            if !has_next_page(&html, &base, page, &self.config.country) {
                info!("No next page found after page {}. Stopping.", page);
                break StopReason::LastPage;
            }

            page += 1;
            self.pause().await;
        };

        Ok(ScrapeSummary {
            source: self.source_name(),
            pages: pages_done,
            rows: sink.rows(),
            output: sink.path().to_path_buf(),
            stop,
        })
    }

    fn source_name(&self) -> &'static str {
        "AgriaffairesDealers"
    }
}

fn directory_path(page: &str, country: &str) -> String {
    format!("/pros/list/{}-{}.html", page, country)
}

/// Dealer blocks of one directory page; addresses are filled in later.
/// A block without a usable link is kept with an empty URL.
pub fn parse_dealer_blocks(html: &str, base: &Url) -> Vec<Dealer> {
    let document = Html::parse_document(html);
    document
        .select(&selector("div.listing-block.listing-block--dealer"))
        .map(|block| parse_dealer_block(block, base))
        .collect()
}

fn parse_dealer_block(block: ElementRef, base: &Url) -> Dealer {
    let url = block
        .select(&selector("a.listing-block__link"))
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| base.join(href.trim()).ok())
        .map(|url| url.to_string())
        .unwrap_or_default();

    let brands = first_text(block, "div.listing-block__brands strong.u-small")
        .map(|text| {
            text.split(", ")
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Dealer {
        name: first_text(block, "span.listing-block__title").unwrap_or_default(),
        url,
        activity: first_text(block, "div.listing-block__activity").unwrap_or_default(),
        location: first_text(block, "div.listing-block__localisation").unwrap_or_default(),
        brands,
        ads_count: first_text(block, "div.listing-block__number").unwrap_or_default(),
        ..Default::default()
    }
}

/// Main address plus the alternative branches listed in the address picker
pub fn parse_dealer_page(html: &str) -> (DealerAddress, Vec<DealerAddress>) {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let main = match root.select(&selector("p[itemprop='address']")).next() {
        Some(address) => DealerAddress {
            street_address: first_text(address, "span[itemprop='streetAddress']").unwrap_or_default(),
            postal_code: first_text(address, "span[itemprop='postalCode']").unwrap_or_default(),
            locality: first_text(address, "span[itemprop='addressLocality']").unwrap_or_default(),
        },
        None => DealerAddress::default(),
    };

    // options read "<postal code> <locality>"
    let others = root
        .select(&selector("select#js-change-adresse option"))
        .map(element_text)
        .filter(|text| !text.is_empty() && text != ALL_ADDRESSES)
        .filter_map(|text| {
            let (postal_code, locality) = text.split_once(' ')?;
            Some(DealerAddress {
                street_address: String::new(),
                postal_code: postal_code.to_string(),
                locality: locality.to_string(),
            })
        })
        .collect();

    debug!("Parsed main address {:?}", main);
    (main, others)
}

/// The right-hand pager arrow must point at exactly the following page
pub fn has_next_page(html: &str, base: &Url, page: u32, country: &str) -> bool {
    let expected = directory_path(&(page + 1).to_string(), country);
    let document = Html::parse_document(html);
    let found = document
        .select(&selector(".pagination--nav.nav-right a"))
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .any(|url| url.path() == expected);
    found
}
