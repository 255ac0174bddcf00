use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const BASE_BACKOFF_SECS: u64 = 60;
const MAX_BACKOFF_SECS: u64 = 3600;
const ALL_BACKED_OFF_PAUSE: Duration = Duration::from_secs(5);

/// Picks the healthiest proxy and parks failing ones with exponential backoff
#[derive(Debug, Default)]
pub struct ProxyManager {
    proxies: Vec<String>,
    failures: HashMap<String, u32>,
    backoff_until: HashMap<String, Instant>,
}

impl ProxyManager {
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies,
            failures: HashMap::new(),
            backoff_until: HashMap::new(),
        }
    }

    pub fn failures(&self, proxy: &str) -> u32 {
        self.failures.get(proxy).copied().unwrap_or(0)
    }

    /// `min(60 * 2^failures, 3600)` seconds
    pub fn backoff_for(failures: u32) -> Duration {
        let secs = 2u64
            .checked_pow(failures)
            .and_then(|factor| factor.checked_mul(BASE_BACKOFF_SECS))
            .unwrap_or(MAX_BACKOFF_SECS)
            .min(MAX_BACKOFF_SECS);
        Duration::from_secs(secs)
    }

    /// Fewest failures among proxies whose backoff expired before `now`; list order breaks ties
    pub fn select_at(&self, now: Instant) -> Option<&str> {
        self.proxies
            .iter()
            .filter(|p| self.backoff_until.get(*p).map_or(true, |until| now > *until))
            .min_by_key(|p| self.failures(p))
            .map(String::as_str)
    }

    /// Next usable proxy, waiting while every proxy is backed off.
    /// `None` means the list is empty and requests go out directly.
    pub async fn select(&self) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        loop {
            if let Some(proxy) = self.select_at(Instant::now()) {
                debug!("Using proxy {}", redact(proxy));
                return Some(proxy.to_string());
            }
            info!("All proxies are backing off; waiting {:?}", ALL_BACKED_OFF_PAUSE);
            tokio::time::sleep(ALL_BACKED_OFF_PAUSE).await;
        }
    }

    pub fn mark_failed_at(&mut self, proxy: &str, now: Instant) {
        let failures = self.failures.entry(proxy.to_string()).or_insert(0);
        *failures += 1;
        let backoff = Self::backoff_for(*failures);
        warn!(
            "Proxy {} failed ({} failures); backing off {}s",
            redact(proxy),
            failures,
            backoff.as_secs()
        );
        self.backoff_until.insert(proxy.to_string(), now + backoff);
    }

    pub fn mark_failed(&mut self, proxy: &str) {
        self.mark_failed_at(proxy, Instant::now());
    }

    pub fn mark_success(&mut self, proxy: &str) {
        if let Some(failures) = self.failures.get_mut(proxy) {
            *failures = failures.saturating_sub(1);
        }
    }
}

/// Proxy URL with credentials stripped, for logs
pub fn redact(proxy: &str) -> String {
    match url::Url::parse(proxy) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", parsed.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", parsed.scheme(), host),
            _ => "<proxy>".to_string(),
        },
        Err(_) => "<proxy>".to_string(),
    }
}
