use crate::config::{HttpConfig, SiteConfig};
use crate::fetch::FetchError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Parameters of one listing run
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOptions {
    /// First results page
    pub start_url: String,
    /// Stop after this many results pages
    pub max_pages: Option<u32>,
    /// Follow each listing to its detail page
    pub details: bool,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    /// Rebuild sessions after this many detail fetches (0 disables)
    pub refresh_sessions_every: usize,
}

impl ScrapeOptions {
    pub fn from_config(site: &SiteConfig, http: &HttpConfig, default_url: &str) -> Self {
        Self {
            start_url: site
                .start_url
                .clone()
                .unwrap_or_else(|| default_url.to_string()),
            max_pages: site.max_pages,
            details: site.details,
            min_delay_secs: http.min_delay_secs,
            max_delay_secs: http.max_delay_secs,
            refresh_sessions_every: http.refresh_sessions_every,
        }
    }
}

/// Why a run ended; in every case the rows collected so far are on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    LastPage,
    NoMoreResults,
    PageLimit,
    FetchFailed,
    Challenge,
}

impl StopReason {
    pub fn from_error(error: &FetchError) -> Self {
        match error {
            FetchError::Challenge { .. } => StopReason::Challenge,
            _ => StopReason::FetchFailed,
        }
    }

    /// Whether the run ended because of a failure rather than running out of pages
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::FetchFailed | StopReason::Challenge)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::LastPage => "reached the last page",
            StopReason::NoMoreResults => "no more results",
            StopReason::PageLimit => "page limit reached",
            StopReason::FetchFailed => "fetch failed after retries",
            StopReason::Challenge => "blocked by anti-bot challenge",
        };
        f.write_str(text)
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub source: &'static str,
    pub pages: u32,
    pub rows: usize,
    pub output: PathBuf,
    pub stop: StopReason,
}
