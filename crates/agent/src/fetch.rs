//! Outbound fetch pipeline.
//!
//! The network sits behind the [`Fetcher`] trait so the interception and
//! install logic can be exercised against a scripted fake. The production
//! implementation is a thin reqwest wrapper with a timeout, a user agent,
//! and a body size cap.
//!
//! A non-success HTTP status is still a successful fetch here — the
//! interception layer decides what a 404 means. Only transport-level
//! failures (DNS, refused connection, timeout) surface as errors.

use async_trait::async_trait;
use bytes::Bytes;
use gatehouse_core::{Error, StoredResponse, cache::compute_entry_key};
use reqwest::Client;
use std::time::{Duration, Instant};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "gatehouse/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "gatehouse/0.1".to_string(), max_bytes: 5 * 1024 * 1024, timeout: Duration::from_millis(20000) }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// The URL requested.
    pub url: String,
    /// The final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers as (name, value) pairs.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Bytes,
    /// Time taken to fetch in milliseconds.
    pub fetch_ms: u64,
}

impl FetchedResponse {
    /// Convert into the cache store's record form, keyed by the request URL.
    pub fn to_stored(&self) -> StoredResponse {
        StoredResponse {
            key: compute_entry_key("GET", &self.url),
            url: self.url.clone(),
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.to_vec(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Capability trait over the actual network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a GET for the given canonical URL.
    async fn fetch(&self, url: &str) -> Result<FetchedResponse, Error>;
}

/// HTTP fetch client backed by reqwest.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::TooLarge(len as usize));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::TooLarge(body.len()));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, status, fetch_ms, body.len());

        Ok(FetchedResponse { url: url.to_string(), final_url, status, headers, body, fetch_ms })
    }
}
