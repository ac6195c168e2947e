use crate::error::IngestError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for the source-site HTTP client
#[derive(Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_retries: usize,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let fetch = crate::config::FetchConfig::default();
        Self {
            timeout: Duration::from_secs(fetch.timeout_secs),
            user_agent: fetch.user_agent,
            max_retries: fetch.max_retries,
            initial_retry_delay_ms: fetch.initial_retry_delay_ms,
            max_retry_delay_ms: fetch.max_retry_delay_ms,
        }
    }
}

/// The seam between the fetch tasks and the network. Tests substitute a
/// stub that serves canned reader/catalog pages.
#[async_trait]
pub trait PageFetcher {
    /// Fetch a page and return its body, optionally presenting a session
    /// cookie. A non-2xx response is an error.
    async fn fetch_page(&self, url: &str, cookie: Option<&str>) -> Result<String, IngestError>;
}

/// HTTP client with browser-like headers and retry on transient failures
pub struct EnhancedHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl EnhancedHttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .unwrap(),
        );
        headers.insert("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8".parse().unwrap());
        headers.insert("Connection", "keep-alive".parse().unwrap());
        headers.insert("Upgrade-Insecure-Requests", "1".parse().unwrap());

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Exponential backoff with jitter
    fn retry_delay(&self, attempt: usize) -> Duration {
        let base = self.config.initial_retry_delay_ms;
        let capped = (base * 2u64.pow(attempt as u32)).min(self.config.max_retry_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((capped as f64 * jitter) as u64)
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }

    /// Fetch a URL with retry on transient failures. Returns the final
    /// response even when its status is a non-retryable error; callers
    /// decide what a non-2xx means for them.
    pub async fn get_with_retry(
        &self,
        url: &str,
        extra_headers: Option<HeaderMap>,
    ) -> Result<Response, reqwest::Error> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            let mut request = self.client.get(url);
            if let Some(ref headers) = extra_headers {
                request = request.headers(headers.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if Self::is_retryable_status(status) && attempt < self.config.max_retries {
                        log::warn!(
                            "retryable status {} for {}, attempt {}/{}",
                            status,
                            url,
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                        sleep(self.retry_delay(attempt)).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect() || e.is_request();
                    if transient && attempt < self.config.max_retries {
                        log::warn!(
                            "request failed for {}, attempt {}/{}: {}",
                            url,
                            attempt + 1,
                            self.config.max_retries + 1,
                            e
                        );
                        sleep(self.retry_delay(attempt)).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for EnhancedHttpClient {
    async fn fetch_page(&self, url: &str, cookie: Option<&str>) -> Result<String, IngestError> {
        let headers = match cookie {
            Some(value) => {
                let mut headers = HeaderMap::new();
                let value = HeaderValue::from_str(value)
                    .map_err(|_| IngestError::Config("session cookie is not a valid header value".to_string()))?;
                headers.insert(COOKIE, value);
                Some(headers)
            }
            None => None,
        };

        let response = self.get_with_retry(url, headers).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}
