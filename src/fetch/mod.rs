pub mod browser;
pub mod headers;
pub mod http;
pub mod proxy;
#[cfg(test)]
pub(crate) mod stub;
pub mod throttle;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

use async_trait::async_trait;
use std::future::Future;
use tracing::warn;

/// Body fragments that identify an anti-bot interstitial instead of real content
const CHALLENGE_MARKERS: [&str; 5] = [
    "cf-challenge",
    "challenge-platform",
    "Just a moment...",
    "Attention Required! | Cloudflare",
    "cf-browser-verification",
];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("anti-bot challenge served for {url}")]
    Challenge { url: String },

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("browser failed on {url}: {message}")]
    Browser { url: String, message: String },

    #[error("no session available to fetch {url}")]
    NoSession { url: String },
}

impl FetchError {
    /// Whether another attempt at the same URL can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Challenge { .. } | FetchError::NoSession { .. } => false,
            FetchError::Status { status, .. } => {
                *status >= 500 || *status == 403 || *status == 408 || *status == 429
            }
            FetchError::Transport { .. } | FetchError::Browser { .. } => true,
        }
    }
}

/// Anything that can turn a URL into page HTML
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    /// Drop and rebuild sessions (new user agents, fresh cookies)
    async fn refresh(&self) {}

    fn name(&self) -> &'static str;
}

/// Error statuses need any challenge marker. A 2xx body only counts when it is the
/// interstitial itself: real pages load `/cdn-cgi/challenge-platform/` scripts too.
pub fn looks_like_challenge(status: u16, body: &str) -> bool {
    match status {
        403 | 503 => CHALLENGE_MARKERS.iter().any(|m| body.contains(m)),
        200..=299 => {
            body.contains("<title>Just a moment...</title>")
                && (body.contains("cf-challenge") || body.contains("cf_chl_opt"))
        }
        _ => false,
    }
}

/// Run `attempt` up to `max_attempts` times, pausing `error_delay_secs` (jittered) between failures.
/// Permanent failures are returned immediately.
pub async fn with_retries<F, Fut>(
    url: &str,
    max_attempts: u32,
    error_delay_secs: f64,
    mut attempt: F,
) -> Result<String, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String, FetchError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut n = 1;
    loop {
        match attempt(n).await {
            Ok(body) => return Ok(body),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if n >= max_attempts => {
                warn!("Giving up on {} after {} attempts: {}", url, n, e);
                return Err(e);
            }
            Err(e) => {
                let pause = throttle::adaptive_delay(error_delay_secs, error_delay_secs);
                warn!(
                    "Attempt {}/{} for {} failed: {} (retrying in {:.1}s)",
                    n,
                    max_attempts,
                    url,
                    e,
                    pause.as_secs_f64()
                );
                tokio::time::sleep(pause).await;
                n += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_detection_needs_marker_and_status() {
        assert!(looks_like_challenge(403, "<title>Just a moment...</title>"));
        assert!(looks_like_challenge(503, "<div id=\"cf-challenge\">"));
        assert!(!looks_like_challenge(403, "<h1>Forbidden</h1>"));
        assert!(!looks_like_challenge(200, "<title>Just a moment...</title><div class=listing-block>"));
        assert!(looks_like_challenge(
            200,
            "<title>Just a moment...</title><script>window._cf_chl_opt={cType:'managed'};</script>"
        ));
        assert!(looks_like_challenge(200, "<title>Just a moment...</title><div id=\"cf-challenge-running\">"));
        assert!(!looks_like_challenge(404, "cf-challenge"));
    }

    #[test]
    fn platform_script_on_real_page_is_not_a_challenge() {
        let page = r#"<html><head><title>Used tractors</title>
            <script src="/cdn-cgi/challenge-platform/scripts/jsd/main.js"></script></head>
            <body><div class="listing-block"></div></body></html>"#;
        assert!(!looks_like_challenge(200, page));
        assert!(looks_like_challenge(403, page));
    }

    #[test]
    fn retryable_classification() {
        let status = |status| FetchError::Status {
            status,
            url: "https://example.com".to_string(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!FetchError::Challenge {
            url: "https://example.com".to_string()
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let mut calls = 0;
        let body = with_retries("https://example.com", 3, 0.0, |n| {
            calls += 1;
            async move {
                if n < 3 {
                    Err(FetchError::Status {
                        status: 502,
                        url: "https://example.com".to_string(),
                    })
                } else {
                    Ok("<html></html>".to_string())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let mut calls = 0;
        let result = with_retries("https://example.com", 3, 0.0, |_| {
            calls += 1;
            async {
                Err(FetchError::Challenge {
                    url: "https://example.com".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(FetchError::Challenge { .. })));
        assert_eq!(calls, 1);
    }
}
