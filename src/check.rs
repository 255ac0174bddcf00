use crate::fetch::http::{HttpFetcher, RawResponse};
use crate::fetch::looks_like_challenge;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Page fragments that show a results page rendered the parts the scrapers rely on
const MARKERS: [(&str, &str); 7] = [
    ("Agriaffaires listing blocks", "listing-block__link"),
    ("Agriaffaires dealer blocks", "listing-block listing-block--dealer"),
    ("Agriaffaires pagination", "pagination--"),
    ("FarmMachineryLocator cards", "listing-card-grid"),
    ("FarmMachineryLocator pagination", "pagination__next"),
    ("Mascus results", "SearchResult_searchResultItemWrapper"),
    ("Mascus pagination", r#"aria-label="Next""#),
];

#[derive(Debug)]
pub struct CheckReport {
    pub status: u16,
    pub length: usize,
    pub challenge: bool,
    /// Marker label and whether the body contains it
    pub markers: Vec<(&'static str, bool)>,
    pub saved_to: PathBuf,
}

/// Fetch `url` once, save the raw body under `debug_dir` and report what it contains
pub async fn check_url(fetcher: &HttpFetcher, url: &str, debug_dir: &Path) -> Result<CheckReport> {
    info!("🔎 Checking {}", url);
    let response = fetcher
        .fetch_raw(url)
        .await
        .with_context(|| format!("Error fetching {}", url))?;
    let report = inspect(&response, debug_dir)?;
    log_report(&response, &report);
    Ok(report)
}

fn inspect(response: &RawResponse, debug_dir: &Path) -> Result<CheckReport> {
    std::fs::create_dir_all(debug_dir)
        .with_context(|| format!("Failed to create {}", debug_dir.display()))?;
    let saved_to = debug_dir.join("response.html");
    std::fs::write(&saved_to, &response.body)
        .with_context(|| format!("Error saving HTML to {}", saved_to.display()))?;

    let markers = MARKERS
        .iter()
        .map(|(label, needle)| (*label, response.body.contains(needle)))
        .collect();

    Ok(CheckReport {
        status: response.status,
        length: response.body.len(),
        challenge: looks_like_challenge(response.status, &response.body),
        markers,
        saved_to,
    })
}

fn log_report(response: &RawResponse, report: &CheckReport) {
    info!("💾 Full HTML response saved to {}", report.saved_to.display());
    info!("Status code: {}", report.status);
    info!("Content length: {} bytes", report.length);
    for (name, value) in &response.headers {
        info!("  {}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    let preview: String = response.body.chars().take(1000).collect();
    debug!("First 1000 characters:\n{}", preview);

    if report.challenge {
        warn!("⚠️  The response is an anti-bot challenge page");
    }
    let found: Vec<&str> = report.markers.iter().filter(|(_, hit)| *hit).map(|(label, _)| *label).collect();
    if found.is_empty() {
        warn!("⚠️  No known listing or pagination markers in the response");
    } else {
        for label in found {
            info!("✅ Contains {}", label);
        }
    }
}
