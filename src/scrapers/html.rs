use crate::models::squash_whitespace;
use scraper::{ElementRef, Selector};
use url::Url;

pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Visible text of an element with whitespace normalised
pub fn element_text(element: ElementRef) -> String {
    squash_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first match below `element`, `None` if absent or blank
pub fn first_text(element: ElementRef, css: &str) -> Option<String> {
    element
        .select(&selector(css))
        .map(element_text)
        .find(|text| !text.is_empty())
}

pub fn first_attr(element: ElementRef, css: &str, attr: &str) -> Option<String> {
    element
        .select(&selector(css))
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Absolute form of `href` relative to the page it was found on
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

pub fn has_class_fragment(element: ElementRef, fragment: &str) -> bool {
    element
        .value()
        .attr("class")
        .map_or(false, |class| class.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn text_helpers_skip_blank_matches() {
        let doc = Html::parse_fragment(
            r#"<div><span class="a">  </span><span class="a">Fendt
                 724 Vario</span><a class="l" href=" /x/1.html ">go</a></div>"#,
        );
        let root = doc.root_element();
        assert_eq!(first_text(root, "span.a").as_deref(), Some("Fendt 724 Vario"));
        assert_eq!(first_text(root, "span.missing"), None);
        assert_eq!(first_attr(root, "a.l", "href").as_deref(), Some("/x/1.html"));
    }

    #[test]
    fn resolves_relative_links() {
        let base = Url::parse("https://www.agriaffaires.co.uk/used/farm-tractor/1/4044/massey-ferguson.html").unwrap();
        assert_eq!(
            resolve(&base, "/used/farm-tractor/12345/mf-5713.html").as_deref(),
            Some("https://www.agriaffaires.co.uk/used/farm-tractor/12345/mf-5713.html")
        );
        assert_eq!(
            resolve(&base, "https://other.example/a").as_deref(),
            Some("https://other.example/a")
        );
    }
}
