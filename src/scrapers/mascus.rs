use crate::models::{text_or_na, Listing, Source};
use crate::scrapers::html::{first_text, has_class_fragment, resolve, selector};
use crate::scrapers::traits::SiteParser;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

pub const DEFAULT_START_URL: &str = "https://www.mascus.co.uk/agriculture/tractors/case_ih";

// Class names carry a build hash (`SearchResult_brandmodel__04K2L`), so match on the stable prefix
const ITEM: &str = r#"[class*="SearchResult_searchResultItemWrapper"]"#;
const TITLE: &str = r#"[class*="SearchResult_brandmodel"]"#;
const BODY_LINE: &str = r#"[class*="typography__BodyText2"]"#;
const COMPANY: &str = r#"[class*="SearchResult_companyName"]"#;
const ASSET_LINK: &str = r#"a[class*="SearchResult_assetHeaderUrl"]"#;
const COMPANY_LINK: &str = r#"[class*="SearchResult_companyWrapper"] a"#;

pub struct MascusParser;

impl MascusParser {
    fn parse_item(item: ElementRef, page_url: &Url) -> Option<Listing> {
        let href = item
            .select(&selector(ASSET_LINK))
            .find_map(|a| a.value().attr("href"))?;
        let url = resolve(page_url, href)?;

        let mut listing = Listing::new(Source::Mascus, text_or_na(first_text(item, TITLE)), url);

        // "Location • 2017 • 5 400 h • ..."
        if let Some(line) = first_text(item, BODY_LINE) {
            let parts: Vec<&str> = line.split('•').map(str::trim).collect();
            listing.year = text_or_na(parts.get(1).map(|p| p.to_string()));
            listing.hours = text_or_na(parts.get(2).map(|p| p.to_string()));
        }

        listing.dealer = text_or_na(first_text(item, COMPANY));
        listing.dealer_url = text_or_na(
            item.select(&selector(COMPANY_LINK))
                .find_map(|a| a.value().attr("href"))
                .and_then(|href| resolve(page_url, href)),
        );

        Some(listing)
    }
}

impl SiteParser for MascusParser {
    fn source(&self) -> Source {
        Source::Mascus
    }

    fn parse_results(&self, html: &str, page_url: &Url) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let items: Vec<_> = document.select(&selector(ITEM)).collect();
        debug!("Found {} result items", items.len());

        items
            .into_iter()
            .filter_map(|item| Self::parse_item(item, page_url))
            .collect()
    }

    fn next_page(&self, html: &str, page_url: &Url) -> Option<String> {
        let document = Html::parse_document(html);
        let next = document.select(&selector(r#"a[aria-label="Next"]"#)).next()?;
        if has_class_fragment(next, "disabled") || next.value().attr("aria-disabled") == Some("true") {
            return None;
        }
        resolve(page_url, next.value().attr("href")?)
    }

    fn ready_selector(&self) -> Option<&'static str> {
        Some(ITEM)
    }
}
