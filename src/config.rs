use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Runtime configuration, loaded from an optional TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
    pub agriaffaires: SiteConfig,
    pub fml: SiteConfig,
    pub mascus: SiteConfig,
    pub dealers: DealersConfig,
}

impl ScoutConfig {
    /// Read `path` if given, otherwise fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("Invalid config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.http.validate()?;
        Ok(config)
    }
}

/// Session, pacing and retry settings shared by the HTTP fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub requests_per_minute: u32,
    /// Pause between pages and between detail fetches
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    /// Base pause after a failed attempt
    pub error_delay_secs: f64,
    pub session_pool_size: usize,
    /// Rebuild every session after this many detail fetches (0 disables)
    pub refresh_sessions_every: usize,
    pub proxies: Vec<String>,
    /// Needed behind intercepting proxies that re-sign TLS
    pub accept_invalid_certs: bool,
    pub extra_headers: HashMap<String, String>,
    pub cookies: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            requests_per_minute: 15,
            min_delay_secs: 5.0,
            max_delay_secs: 15.0,
            error_delay_secs: 30.0,
            session_pool_size: 5,
            refresh_sessions_every: 50,
            proxies: Vec::new(),
            accept_invalid_certs: false,
            extra_headers: HashMap::new(),
            cookies: Vec::new(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            anyhow::bail!("http.max_retries must be at least 1");
        }
        if self.requests_per_minute == 0 {
            anyhow::bail!("http.requests_per_minute must be at least 1");
        }
        if self.min_delay_secs < 0.0 || self.max_delay_secs < self.min_delay_secs {
            anyhow::bail!(
                "http delays must satisfy 0 <= min_delay_secs <= max_delay_secs (got {} and {})",
                self.min_delay_secs,
                self.max_delay_secs
            );
        }
        if self.session_pool_size == 0 {
            anyhow::bail!("http.session_pool_size must be at least 1");
        }
        Ok(())
    }
}

/// Headless Chrome settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Seconds to let the page settle after navigation
    pub settle_secs: u64,
    /// Scroll rounds without height growth before the page counts as fully loaded
    pub max_unchanged_scrolls: u32,
    pub max_scroll_rounds: u32,
    pub scroll_step_px: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            settle_secs: 8,
            max_unchanged_scrolls: 3,
            max_scroll_rounds: 40,
            scroll_step_px: 4000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            format: OutputFormat::Csv,
        }
    }
}

/// Per-site start URL and limits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub start_url: Option<String>,
    pub max_pages: Option<u32>,
    pub details: bool,
    pub browser: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DealersConfig {
    pub country: String,
    pub max_pages: Option<u32>,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for DealersConfig {
    fn default() -> Self {
        Self {
            country: "germany".to_string(),
            max_pages: None,
            min_delay_secs: 2.0,
            max_delay_secs: 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ScoutConfig::from_toml("").unwrap();
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.http.requests_per_minute, 15);
        assert_eq!(config.output.results_dir, PathBuf::from("results"));
        assert_eq!(config.dealers.country, "germany");
        assert!(config.browser.headless);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ScoutConfig::from_toml(
            r#"
            [http]
            max_retries = 5
            proxies = ["http://10.0.0.1:8080"]

            [http.extra_headers]
            "Accept-Language" = "en-GB,en;q=0.5"

            [mascus]
            start_url = "https://www.mascus.co.uk/agriculture/tractors/case_ih"
            max_pages = 2

            [output]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.proxies.len(), 1);
        assert_eq!(
            config.http.extra_headers.get("Accept-Language").map(String::as_str),
            Some("en-GB,en;q=0.5")
        );
        assert_eq!(config.mascus.max_pages, Some(2));
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn rejects_inverted_delays() {
        let err = ScoutConfig::from_toml(
            r#"
            [http]
            min_delay_secs = 10.0
            max_delay_secs = 2.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("delays"));
    }
}
