use crate::models::{squash_whitespace, text_or_na, Listing, ListingDetail, Source, NOT_AVAILABLE};
use crate::scrapers::html::{element_text, first_attr, first_text, has_class_fragment, resolve, selector};
use crate::scrapers::paginate::UrlTemplate;
use crate::scrapers::traits::SiteParser;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

pub const DEFAULT_START_URL: &str =
    "https://www.agriaffaires.co.uk/used/farm-tractor/1/4044/massey-ferguson.html";

/// Agriaffaires results and detail pages.
/// Results page numbers live in the URL path; the `N / M` pagination label says when to stop.
pub struct AgriaffairesParser {
    template: Option<UrlTemplate>,
}

impl AgriaffairesParser {
    pub fn new(start_url: &str) -> Self {
        let template = UrlTemplate::from_numeric_segment(start_url).map(|(template, _)| template);
        if template.is_none() {
            debug!("No page index in {}; falling back to next links", start_url);
        }
        Self { template }
    }

    fn parse_block(block: ElementRef, page_url: &Url) -> Option<Listing> {
        let link = block.select(&selector("a.listing-block__link")).next()?;
        let href = link.value().attr("href")?;
        let url = resolve(page_url, href)?;
        let title = text_or_na(first_text(link, "span.listing-block__title"));

        let mut listing = Listing::new(Source::Agriaffaires, title, url);

        // label/value spans alternate: Year, 2015, Hours, 4 500 h, Power, 120 hp
        let description: Vec<String> = block
            .select(&selector("div.listing-block__description span"))
            .map(element_text)
            .collect();
        listing.year = text_or_na(description.get(1).cloned());
        listing.hours = text_or_na(description.get(3).cloned());
        listing.horsepower = text_or_na(description.get(5).cloned());

        listing.location = block
            .select(&selector("div.listing-block__localisation"))
            .next()
            .map(location_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        listing.price = block
            .select(&selector("div.listing-block__price"))
            .next()
            .map(price_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        Some(listing)
    }
}

impl SiteParser for AgriaffairesParser {
    fn source(&self) -> Source {
        Source::Agriaffaires
    }

    fn parse_results(&self, html: &str, page_url: &Url) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let blocks: Vec<_> = document.select(&selector("div.listing-block")).collect();
        debug!("Found {} listing blocks", blocks.len());

        blocks
            .into_iter()
            .filter(|block| !has_class_fragment(*block, "listing-block--dealer"))
            .filter_map(|block| Self::parse_block(block, page_url))
            .collect()
    }

    fn next_page(&self, html: &str, page_url: &Url) -> Option<String> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        if let Some((current, total)) = pagination_position(root) {
            if current >= total {
                return None;
            }
            if let Some(template) = &self.template {
                return Some(template.page_url(current + 1));
            }
        }

        let href = first_attr(root, "a.next", "href")?;
        resolve(page_url, &href)
    }

    fn supports_details(&self) -> bool {
        true
    }

    fn parse_detail(&self, html: &str) -> ListingDetail {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let price = root
            .select(&selector("div.price"))
            .next()
            .map(price_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let dealer_box = root.select(&selector("div.item-fluid.item-center")).next();
        let dealer = text_or_na(dealer_box.and_then(|b| first_text(b, "p.u-bold.h3-like")));
        let dealer_location = text_or_na(dealer_box.and_then(|b| first_text(b, "div.u-bold")));

        let phone_numbers = root
            .select(&selector("ul#js-dropdown-phone-2 a"))
            .filter_map(|a| a.value().attr("href"))
            .map(|href| {
                href.trim()
                    .trim_start_matches("tel://")
                    .trim_start_matches("tel:")
                    .trim()
                    .to_string()
            })
            .filter(|phone| !phone.is_empty())
            .collect();

        let specifications = root
            .select(&selector("table.table--specs tr"))
            .filter_map(|row| {
                let cells: Vec<String> = row.select(&selector("td")).map(element_text).collect();
                match cells.as_slice() {
                    [key, value] => Some((key.replace(':', "").trim().to_string(), value.clone())),
                    _ => None,
                }
            })
            .collect();

        ListingDetail {
            price,
            dealer,
            dealer_location,
            phone_numbers,
            specifications,
        }
    }
}

/// `current / total` from the `li.pagination--simple` label
fn pagination_position(root: ElementRef) -> Option<(u32, u32)> {
    let label = first_text(root, "li.pagination--simple")?;
    let (current, total) = label.split_once('/')?;
    let current = current.trim().rsplit(' ').next()?.parse().ok()?;
    let total = total.trim().split(' ').next()?.parse().ok()?;
    Some((current, total))
}

/// `12 500 £`: value and currency spans, whichever exist
fn price_text(container: ElementRef) -> String {
    let value = first_text(container, ".js-priceToChange");
    let currency = first_text(container, ".js-currencyToChange");
    match (value, currency) {
        (Some(value), Some(currency)) => format!("{} {}", value, currency),
        (Some(value), None) => value,
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Location lines joined with commas (town, region, country)
fn location_text(element: ElementRef) -> String {
    let parts: Vec<String> = element
        .text()
        .map(squash_whitespace)
        .filter(|part| !part.is_empty())
        .collect();
    text_or_na(Some(parts.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
        <div class="listing-block listing-block--classified">
          <a class="listing-block__link" href="/used/farm-tractor/48211234/massey-ferguson-5713-s.html">
            <span class="listing-block__title">Massey Ferguson 5713 S</span>
          </a>
          <div class="listing-block__description">
            <span>Year</span><span>2019</span>
            <span>Hours</span><span>2 150 h</span>
            <span>Power</span><span>130 hp</span>
          </div>
          <div class="listing-block__localisation">
            <span>North Yorkshire</span>
            <span>United Kingdom</span>
          </div>
          <div class="listing-block__price">
            <span class="js-priceToChange">48 500</span>
            <span class="js-currencyToChange">£</span>
          </div>
        </div>
        <div class="listing-block listing-block--classified">
          <a class="listing-block__link" href="/used/farm-tractor/48219999/massey-ferguson-135.html">
            <span class="listing-block__title">Massey Ferguson 135</span>
          </a>
          <div class="listing-block__description"><span>Year</span><span>1972</span></div>
        </div>
        <div class="listing-block listing-block--ad">sponsored</div>
        <ul class="pagination"><li class="pagination--simple">1 / 3</li></ul>
        </body></html>
    "#;

    const DETAIL_PAGE: &str = r#"
        <html><body>
        <div class="price txtcenter">
          <span class="js-priceToChange">48 500</span> <span class="js-currencyToChange">£</span>
        </div>
        <div class="item-fluid item-center">
          <p class="u-bold h3-like man">Yorkshire Tractors Ltd</p>
          <div class="u-bold">Thirsk, North Yorkshire</div>
        </div>
        <ul id="js-dropdown-phone-2">
          <li><a href="tel://+441845000111">Call</a></li>
          <li><a href="tel:+447700900123">Mobile</a></li>
        </ul>
        <table class="table--specs">
          <tr><td>Make:</td><td>Massey Ferguson</td></tr>
          <tr><td>Year of manufacture:</td><td>2019</td></tr>
          <tr><td colspan="2">Options</td></tr>
        </table>
        </body></html>
    "#;

    fn page_url() -> Url {
        Url::parse(DEFAULT_START_URL).unwrap()
    }

    #[test]
    fn parses_results_page() {
        let parser = AgriaffairesParser::new(DEFAULT_START_URL);
        let listings = parser.parse_results(RESULTS_PAGE, &page_url());
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.title, "Massey Ferguson 5713 S");
        assert_eq!(
            first.url,
            "https://www.agriaffaires.co.uk/used/farm-tractor/48211234/massey-ferguson-5713-s.html"
        );
        assert_eq!(first.year, "2019");
        assert_eq!(first.hours, "2 150 h");
        assert_eq!(first.horsepower, "130 hp");
        assert_eq!(first.location, "North Yorkshire, United Kingdom");
        assert_eq!(first.price, "48 500 £");
    }

    #[test]
    fn missing_fields_become_na() {
        let parser = AgriaffairesParser::new(DEFAULT_START_URL);
        let listings = parser.parse_results(RESULTS_PAGE, &page_url());
        let second = &listings[1];
        assert_eq!(second.year, "1972");
        assert_eq!(second.hours, "N/A");
        assert_eq!(second.horsepower, "N/A");
        assert_eq!(second.location, "N/A");
        assert_eq!(second.price, "N/A");
    }

    #[test]
    fn next_page_increments_path_index() {
        let parser = AgriaffairesParser::new(DEFAULT_START_URL);
        assert_eq!(
            parser.next_page(RESULTS_PAGE, &page_url()).as_deref(),
            Some("https://www.agriaffaires.co.uk/used/farm-tractor/2/4044/massey-ferguson.html")
        );

        let last = r#"<ul><li class="pagination--simple">3 / 3</li></ul><a class="next" href="/x">x</a>"#;
        assert_eq!(parser.next_page(last, &page_url()), None);
    }

    #[test]
    fn next_page_falls_back_to_link() {
        let parser = AgriaffairesParser::new("https://www.agriaffaires.co.uk/used/farm-tractor.html");
        let html = r#"<a class="next" href="/used/2/farm-tractor.html">Next</a>"#;
        assert_eq!(
            parser
                .next_page(html, &Url::parse("https://www.agriaffaires.co.uk/used/farm-tractor.html").unwrap())
                .as_deref(),
            Some("https://www.agriaffaires.co.uk/used/2/farm-tractor.html")
        );
        assert_eq!(parser.next_page("<div></div>", &page_url()), None);
    }

    #[test]
    fn parses_detail_page() {
        let parser = AgriaffairesParser::new(DEFAULT_START_URL);
        let detail = parser.parse_detail(DETAIL_PAGE);
        assert_eq!(detail.price, "48 500 £");
        assert_eq!(detail.dealer, "Yorkshire Tractors Ltd");
        assert_eq!(detail.dealer_location, "Thirsk, North Yorkshire");
        assert_eq!(detail.phone_numbers, vec!["+441845000111", "+447700900123"]);
        assert_eq!(
            detail.specifications,
            vec![
                ("Make".to_string(), "Massey Ferguson".to_string()),
                ("Year of manufacture".to_string(), "2019".to_string()),
            ]
        );
    }

    #[test]
    fn empty_detail_page_is_all_na() {
        let parser = AgriaffairesParser::new(DEFAULT_START_URL);
        let detail = parser.parse_detail("<html><body><p>Removed</p></body></html>");
        assert_eq!(detail.price, "N/A");
        assert_eq!(detail.dealer, "N/A");
        assert_eq!(detail.dealer_location, "N/A");
        assert!(detail.phone_numbers.is_empty());
        assert!(detail.specifications.is_empty());
    }
}
