//! HTTP client for redirect resolution and page fetching
//!
//! Wraps a `reqwest` client with an optional client-side rate limit and
//! cancellation support. The resolver only sees the [`PageFetcher`] trait.

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, Response, StatusCode,
    header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT},
};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::fetch_error::FetchError;

/// Markup fetched from a URL after redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
}

/// Network seam used by the resolver
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` following redirects and return the final URL.
    /// Any status except 403/451 counts as a response.
    async fn resolve(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError>;

    /// GET `url` and return the body of a successful response
    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

fn is_block_status(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN || status == StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS
}

/// Direct HTTP client with optional rate limiting
pub struct HttpClient {
    client: Client,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    cancellation_token: Option<CancellationToken>,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = NonZeroU32::new(config.max_requests_per_second)
            .map(|limit| RateLimiter::direct(Quota::per_second(limit)));

        Ok(Self {
            client,
            rate_limiter,
            cancellation_token: None,
            config,
        })
    }

    /// Abort waiting requests once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn send(&self, url: &str, referer: Option<&str>) -> Result<Response, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let mut request = self.client.get(parsed);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let token = self.cancellation_token.clone().unwrap_or_default();
        if token.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }

        if let Some(limiter) = &self.rate_limiter {
            tokio::select! {
                () = limiter.until_ready() => {},
                () = token.cancelled() => {
                    return Err(FetchError::Cancelled { url: url.to_string() });
                }
            }
        }

        debug!("Fetching URL: {}", url);

        tokio::select! {
            result = request.send() => result.map_err(|e| FetchError::from_reqwest(url, &e)),
            () = token.cancelled() => {
                warn!("🛑 HTTP request cancelled for URL: {}", url);
                Err(FetchError::Cancelled { url: url.to_string() })
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn resolve(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let response = self.send(url, referer).await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if is_block_status(status) {
            return Err(FetchError::Blocked {
                url: url.to_string(),
                status: status.as_u16(),
                final_url: Some(final_url),
            });
        }

        debug!("Resolved {} -> {} ({})", url, final_url, status);
        Ok(final_url)
    }

    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.send(url, None).await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if is_block_status(status) {
            return Err(FetchError::Blocked {
                url: url.to_string(),
                status: status.as_u16(),
                final_url: Some(final_url),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        debug!("Successfully fetched: {} ({} chars)", final_url, body.len());
        Ok(FetchedPage { final_url, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = HttpClient::new(HttpConfig::default());
        assert!(client.is_ok());
        assert!(client.unwrap().rate_limiter.is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_enabled_by_config() {
        let config = HttpConfig {
            max_requests_per_second: 2,
            ..Default::default()
        };
        let client = HttpClient::new(config).unwrap();
        assert!(client.rate_limiter.is_some());
        assert_eq!(client.config().max_requests_per_second, 2);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_network() {
        let client = HttpClient::new(HttpConfig::default()).unwrap();
        let error = client.resolve("not a url", None).await.unwrap_err();
        assert_eq!(error, FetchError::InvalidUrl("not a url".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let client = HttpClient::new(HttpConfig::default()).unwrap().with_cancellation(token);
        let error = client.fetch_text("https://acme.io/").await.unwrap_err();
        assert!(matches!(error, FetchError::Cancelled { .. }));
    }
}
