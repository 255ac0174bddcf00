use super::headers::browser_like_headers;
use super::proxy::{redact, ProxyManager};
use super::throttle::RequestThrottler;
use super::{looks_like_challenge, with_retries, FetchError, PageSource};
use crate::config::HttpConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::HeaderMap;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Raw single-attempt response, used by the `check` command
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// Clients for direct requests plus one client per proxy in use
struct SessionPool {
    direct: Vec<Client>,
    proxied: HashMap<String, Client>,
}

/// reqwest-based page source with rotating sessions, proxy failover, throttling and retries
pub struct HttpFetcher {
    config: HttpConfig,
    sessions: Mutex<SessionPool>,
    proxies: Mutex<ProxyManager>,
    throttler: Mutex<RequestThrottler>,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self> {
        config.validate()?;
        for proxy in &config.proxies {
            Proxy::all(proxy.as_str())
                .with_context(|| format!("Invalid proxy URL {}", redact(proxy)))?;
        }

        let direct = build_pool(&config)?;
        let throttler = RequestThrottler::new(config.requests_per_minute);
        info!(
            "HTTP fetcher ready: {} sessions, {} proxies, {:.2}s between requests",
            direct.len(),
            config.proxies.len(),
            throttler.interval().as_secs_f64()
        );

        Ok(Self {
            sessions: Mutex::new(SessionPool {
                direct,
                proxied: HashMap::new(),
            }),
            proxies: Mutex::new(ProxyManager::new(config.proxies.clone())),
            throttler: Mutex::new(throttler),
            config,
        })
    }

    async fn client_for(&self, proxy: Option<&str>, url: &str) -> Result<Client, FetchError> {
        let mut pool = self.sessions.lock().await;
        match proxy {
            Some(proxy) => {
                if let Some(client) = pool.proxied.get(proxy) {
                    return Ok(client.clone());
                }
                let client = build_client(&self.config, Some(proxy)).map_err(|source| {
                    FetchError::Transport {
                        url: url.to_string(),
                        source,
                    }
                })?;
                pool.proxied.insert(proxy.to_string(), client.clone());
                Ok(client)
            }
            None => {
                let client = pool
                    .direct
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .ok_or_else(|| FetchError::NoSession {
                        url: url.to_string(),
                    })?;
                Ok(client)
            }
        }
    }

    async fn send(&self, url: &str) -> Result<(Option<String>, reqwest::Response), FetchError> {
        let proxy = self.proxies.lock().await.select().await;
        let client = self.client_for(proxy.as_deref(), url).await?;
        self.throttler.lock().await.wait().await;

        debug!("GET {}", url);
        match client.get(url).send().await {
            Ok(response) => Ok((proxy, response)),
            Err(source) => {
                if let Some(proxy) = &proxy {
                    self.proxies.lock().await.mark_failed(proxy);
                }
                Err(FetchError::Transport {
                    url: url.to_string(),
                    source,
                })
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let (proxy, response) = self.send(url).await?;
        let status = response.status();
        let result = match response.text().await {
            Ok(body) if looks_like_challenge(status.as_u16(), &body) => Err(FetchError::Challenge {
                url: url.to_string(),
            }),
            Ok(_) if !status.is_success() => Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
            Ok(body) => {
                debug!("Downloaded {} bytes from {}", body.len(), url);
                Ok(body)
            }
            Err(source) => Err(FetchError::Transport {
                url: url.to_string(),
                source,
            }),
        };

        if let Some(proxy) = &proxy {
            let mut proxies = self.proxies.lock().await;
            match &result {
                Ok(_) => proxies.mark_success(proxy),
                Err(_) => proxies.mark_failed(proxy),
            }
        }
        result
    }

    /// One request, no retries and no status check
    pub async fn fetch_raw(&self, url: &str) -> Result<RawResponse, FetchError> {
        let (_, response) = self.send(url).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        with_retries(
            url,
            self.config.max_retries,
            self.config.error_delay_secs,
            move |_| self.attempt(url),
        )
        .await
    }

    async fn refresh(&self) {
        match build_pool(&self.config) {
            Ok(direct) => {
                let mut pool = self.sessions.lock().await;
                pool.direct = direct;
                pool.proxied.clear();
                info!("Refreshed HTTP session pool");
            }
            Err(e) => tracing::warn!("Keeping old sessions, refresh failed: {:#}", e),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn build_pool(config: &HttpConfig) -> Result<Vec<Client>> {
    (0..config.session_pool_size)
        .map(|_| build_client(config, None).context("Failed to create HTTP client"))
        .collect()
}

fn build_client(config: &HttpConfig, proxy: Option<&str>) -> reqwest::Result<Client> {
    let headers = browser_like_headers(
        &mut rand::thread_rng(),
        &config.extra_headers,
        &config.cookies,
    );
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .gzip(true)
        .danger_accept_invalid_certs(config.accept_invalid_certs);
    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> HttpConfig {
        HttpConfig {
            max_retries: 3,
            requests_per_minute: 6000,
            error_delay_secs: 0.0,
            session_pool_size: 2,
            ..HttpConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/used/1/farm-tractor.html"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/used/1/farm-tractor.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<div class=\"listing-block\"></div>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_config()).unwrap();
        let body = fetcher
            .fetch_page(&format!("{}/used/1/farm-tractor.html", server.uri()))
            .await
            .unwrap();
        assert!(body.contains("listing-block"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn challenge_page_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string("<title>Just a moment...</title>"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_config()).unwrap();
        let err = fetcher.fetch_page(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Challenge { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_page_with_platform_script_is_returned() {
        let server = MockServer::start().await;
        let page = r#"<html><head><title>Used farm tractors</title>
            <script src="/cdn-cgi/challenge-platform/scripts/jsd/main.js"></script></head>
            <body><div class="listing-block"><a class="listing-block__link" href="/used/1/x.html"></a></div></body></html>"#;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_config()).unwrap();
        let body = fetcher.fetch_page(&server.uri()).await.unwrap();
        assert!(body.contains("listing-block__link"));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn not_found_gives_up_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_config()).unwrap();
        let err = fetcher.fetch_page(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::header("cf-ipcountry", "GB"))
            .and(wiremock::matchers::header("cookie", "country_code=gb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let mut config = fast_config();
        config
            .extra_headers
            .insert("CF-IPCountry".to_string(), "GB".to_string());
        config.cookies.push("country_code=gb".to_string());

        let fetcher = HttpFetcher::new(config).unwrap();
        assert_eq!(fetcher.fetch_page(&server.uri()).await.unwrap(), "ok");
    }

    #[test]
    fn rejects_malformed_proxy() {
        let config = HttpConfig {
            proxies: vec!["::not a proxy::".to_string()],
            ..HttpConfig::default()
        };
        assert!(HttpFetcher::new(config).is_err());
    }
}
