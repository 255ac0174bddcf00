use super::headers::random_user_agent;
use super::{looks_like_challenge, with_retries, FetchError, PageSource};
use crate::config::BrowserConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const COOKIE_BANNER_JS: &str = r#"
    (() => {
        const button = document.querySelector(
            '#didomi-notice-agree-button, #onetrust-accept-btn-handler, button[id*="accept"], button[class*="accept"]'
        );
        if (button) { button.click(); return true; }
        return false;
    })()
"#;

/// Page source backed by one headless Chrome instance for the whole run
pub struct BrowserFetcher {
    browser: Browser,
    config: BrowserConfig,
    ready_selector: Option<String>,
    max_retries: u32,
    error_delay_secs: f64,
}

impl BrowserFetcher {
    pub fn new(
        config: BrowserConfig,
        ready_selector: Option<&str>,
        max_retries: u32,
        error_delay_secs: f64,
    ) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(300))
            .args(vec![
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser,
            config,
            ready_selector: ready_selector.map(str::to_string),
            max_retries,
            error_delay_secs,
        })
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let browser = self.browser.clone();
        let config = self.config.clone();
        let ready = self.ready_selector.clone();
        let target = url.to_string();

        let outcome = tokio::task::spawn_blocking(move || load_page(&browser, &config, ready.as_deref(), &target))
            .await
            .map_err(|e| FetchError::Browser {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let html = outcome.map_err(|e| FetchError::Browser {
            url: url.to_string(),
            message: format!("{:#}", e),
        })?;

        if looks_like_challenge(200, &html) {
            return Err(FetchError::Challenge {
                url: url.to_string(),
            });
        }
        debug!("Captured {} bytes of rendered HTML from {}", html.len(), url);
        Ok(html)
    }
}

#[async_trait]
impl PageSource for BrowserFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        with_retries(url, self.max_retries, self.error_delay_secs, move |_| {
            self.attempt(url)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

/// Open a fresh tab, render `url` fully and return its outer HTML
fn load_page(
    browser: &Browser,
    config: &BrowserConfig,
    ready_selector: Option<&str>,
    url: &str,
) -> Result<String> {
    let tab = browser.new_tab()?;
    let result = render(&tab, config, ready_selector, url);
    if let Err(e) = tab.close(true) {
        debug!("Tab close failed: {}", e);
    }
    result
}

fn render(tab: &Arc<Tab>, config: &BrowserConfig, ready_selector: Option<&str>, url: &str) -> Result<String> {
    let user_agent = random_user_agent(&mut rand::thread_rng());
    tab.set_user_agent(&user_agent, Some("en-GB,en;q=0.9"), None)?;

    info!("Opening {}", url);
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;

    if let Some(selector) = ready_selector {
        let timeout = Duration::from_secs(config.settle_secs.max(1) * 3);
        if tab.wait_for_element_with_custom_timeout(selector, timeout).is_err() {
            warn!("'{}' did not appear within {:?} on {}", selector, timeout, url);
        }
    }
    thread::sleep(Duration::from_secs(config.settle_secs));

    let clicked = tab
        .evaluate(COOKIE_BANNER_JS, false)
        .ok()
        .and_then(|result| result.value)
        .and_then(|value| value.as_bool())
        .unwrap_or(false);
    if clicked {
        debug!("Dismissed cookie banner");
        thread::sleep(Duration::from_secs(2));
    }

    scroll_to_bottom(tab, config)?;

    let html = tab
        .evaluate("document.documentElement.outerHTML", false)?
        .value
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    Ok(html)
}

/// Scroll down until the document height stops growing, for lazily loaded result lists
fn scroll_to_bottom(tab: &Arc<Tab>, config: &BrowserConfig) -> Result<()> {
    let height = |tab: &Arc<Tab>| -> Result<f64> {
        Ok(tab
            .evaluate("document.body.scrollHeight", false)?
            .value
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0))
    };

    let mut last_height = height(tab)?;
    let mut unchanged = 0;
    let mut rounds = 0;

    while unchanged < config.max_unchanged_scrolls && rounds < config.max_scroll_rounds {
        tab.evaluate(&format!("window.scrollBy(0, {});", config.scroll_step_px), false)?;
        thread::sleep(Duration::from_secs(2));
        rounds += 1;

        let new_height = height(tab)?;
        if new_height > last_height {
            last_height = new_height;
            unchanged = 0;
        } else {
            unchanged += 1;
        }
    }

    debug!("Scrolled {} rounds, final height {}", rounds, last_height);
    Ok(())
}
