use crate::models::{text_or_na, Listing, Source};
use crate::scrapers::html::{element_text, first_text, has_class_fragment, resolve, selector};
use crate::scrapers::traits::SiteParser;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

pub const DEFAULT_START_URL: &str =
    "https://www.farmmachinerylocator.co.uk/listings/search?Category=1100&Manufacturer=FENDT&Horsepower=100%2A";

const CARD_SELECTORS: [&str; 2] = ["div.listing-card-grid", "div.list-listing-card-wrapper"];
const LINK_SELECTOR: &str = "a.list-listing-title-link, a.listing-title-link, div.listing-title a";

pub struct FarmMachineryLocatorParser;

impl FarmMachineryLocatorParser {
    fn parse_card(card: ElementRef, page_url: &Url) -> Option<Listing> {
        let link = card.select(&selector(LINK_SELECTOR)).next()?;
        let url = resolve(page_url, link.value().attr("href")?)?;

        let title = first_text(card, "h3.listing-portion-title")
            .or_else(|| first_text(card, "a.listing-title-link"))
            .or_else(|| Some(element_text(link)));
        let mut listing = Listing::new(Source::FarmMachineryLocator, text_or_na(title), url);

        listing.price = text_or_na(first_text(card, "span.price"));
        listing.hours = text_or_na(first_text(card, "span.spec-value"));
        listing.location = text_or_na(
            first_text(card, "div.machine-location").map(|l| l.replace("Location:", "")),
        );
        listing.category = text_or_na(first_text(card, "div.listing-category"));
        listing.dealer = text_or_na(first_text(card, "div.seller a"));
        listing.phone_numbers = card
            .select(&selector("a.phone-link"))
            .map(element_text)
            .filter(|phone| !phone.is_empty())
            .collect();

        Some(listing)
    }
}

impl SiteParser for FarmMachineryLocatorParser {
    fn source(&self) -> Source {
        Source::FarmMachineryLocator
    }

    fn parse_results(&self, html: &str, page_url: &Url) -> Vec<Listing> {
        let document = Html::parse_document(html);

        // grid layout first, list layout on older pages
        for css in CARD_SELECTORS {
            let cards: Vec<_> = document.select(&selector(css)).collect();
            if cards.is_empty() {
                continue;
            }
            debug!("Found {} cards matching {}", cards.len(), css);
            return cards
                .into_iter()
                .filter_map(|card| Self::parse_card(card, page_url))
                .collect();
        }

        debug!("No listing cards on {}", page_url);
        Vec::new()
    }

    fn next_page(&self, html: &str, page_url: &Url) -> Option<String> {
        let document = Html::parse_document(html);
        let next = document.select(&selector("a.pagination__next")).next()?;
        if has_class_fragment(next, "disabled") {
            return None;
        }
        resolve(page_url, next.value().attr("href")?)
    }

    fn ready_selector(&self) -> Option<&'static str> {
        Some("div.listing-card-grid, div.list-listing-card-wrapper")
    }
}
