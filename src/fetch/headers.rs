use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, COOKIE, DNT,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use std::collections::HashMap;
use tracing::warn;

const CHROME_VERSIONS: [&str; 4] = ["120.0.6099.109", "121.0.6167.85", "122.0.6261.94", "124.0.6367.60"];
const FIREFOX_VERSIONS: [&str; 3] = ["121.0", "122.0", "124.0"];
const SAFARI_VERSIONS: [&str; 3] = ["16.6", "17.2", "17.4"];

#[derive(Debug, Clone, Copy)]
enum BrowserFamily {
    Chrome,
    Firefox,
    Safari,
}

/// Desktop user agent for a randomly chosen browser family and version
pub fn random_user_agent<R: Rng + ?Sized>(rng: &mut R) -> String {
    let family = *[BrowserFamily::Chrome, BrowserFamily::Firefox, BrowserFamily::Safari]
        .choose(rng)
        .unwrap_or(&BrowserFamily::Chrome);

    match family {
        BrowserFamily::Chrome => {
            let version = CHROME_VERSIONS.choose(rng).unwrap_or(&CHROME_VERSIONS[0]);
            format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
                version
            )
        }
        BrowserFamily::Firefox => {
            let version = FIREFOX_VERSIONS.choose(rng).unwrap_or(&FIREFOX_VERSIONS[0]);
            format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:{0}) Gecko/20100101 Firefox/{0}",
                version
            )
        }
        BrowserFamily::Safari => {
            let version = SAFARI_VERSIONS.choose(rng).unwrap_or(&SAFARI_VERSIONS[0]);
            format!(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{} Safari/605.1.15",
                version
            )
        }
    }
}

/// Header set a desktop browser sends on a top-level navigation.
/// `extra` entries and `cookies` are layered on top; invalid ones are logged and skipped.
pub fn browser_like_headers<R: Rng + ?Sized>(
    rng: &mut R,
    extra: &HashMap<String, String>,
    cookies: &[String],
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&random_user_agent(rng)) {
        headers.insert(USER_AGENT, ua);
    }
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

    for (name, value) in extra {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Skipping invalid header {}: {}", name, value),
        }
    }

    if !cookies.is_empty() {
        match HeaderValue::from_str(&cookies.join("; ")) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => warn!("Skipping invalid cookie list {:?}", cookies),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn user_agents_come_from_known_families() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let ua = random_user_agent(&mut rng);
            assert!(ua.starts_with("Mozilla/5.0 ("));
            assert!(ua.contains("Chrome/") || ua.contains("Firefox/") || ua.contains("Version/"));
        }
    }

    #[test]
    fn extra_headers_and_cookies_override_defaults() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut extra = HashMap::new();
        extra.insert("Accept-Language".to_string(), "en-GB,en;q=0.5".to_string());
        extra.insert("CF-IPCountry".to_string(), "GB".to_string());
        extra.insert("bad header".to_string(), "x".to_string());

        let headers = browser_like_headers(&mut rng, &extra, &["country_code=gb".to_string()]);
        assert_eq!(headers[ACCEPT_LANGUAGE], "en-GB,en;q=0.5");
        assert_eq!(headers["cf-ipcountry"], "GB");
        assert_eq!(headers[COOKIE], "country_code=gb");
        assert!(headers.contains_key(USER_AGENT));
        assert!(!headers.contains_key("bad header"));
    }
}
