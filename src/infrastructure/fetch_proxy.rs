//! Fetch proxy
//!
//! Fallback path for fetches the direct client cannot complete, e.g. when a
//! site refuses the request. Requests and responses mirror the JSON messages
//! exchanged with a privileged fetch agent.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::fetch_error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyAction {
    AnalyzeUrl,
    FetchContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub action: ProxyAction,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProxyResponse {
    pub fn resolved(final_url: impl Into<String>) -> Self {
        Self {
            success: true,
            final_url: Some(final_url.into()),
            ..Self::default()
        }
    }

    pub fn content(final_url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            success: true,
            final_url: Some(final_url.into()),
            content: Some(content.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait FetchProxy: Send + Sync {
    async fn handle(&self, request: ProxyRequest) -> ProxyResponse;
}

fn proxy_failure(response: ProxyResponse) -> FetchError {
    FetchError::Proxy(
        response
            .error
            .unwrap_or_else(|| "proxy returned no result".to_string()),
    )
}

/// Redirect resolution through the proxy
pub async fn proxy_resolve(proxy: &dyn FetchProxy, url: &str) -> Result<String, FetchError> {
    let response = proxy
        .handle(ProxyRequest {
            action: ProxyAction::AnalyzeUrl,
            url: url.to_string(),
        })
        .await;
    match response {
        ProxyResponse {
            success: true,
            final_url: Some(final_url),
            ..
        } => Ok(final_url),
        other => Err(proxy_failure(other)),
    }
}

/// Markup fetch through the proxy; returns `(final_url, content)`
pub async fn proxy_fetch(proxy: &dyn FetchProxy, url: &str) -> Result<(String, String), FetchError> {
    let response = proxy
        .handle(ProxyRequest {
            action: ProxyAction::FetchContent,
            url: url.to_string(),
        })
        .await;
    match response {
        ProxyResponse {
            success: true,
            content: Some(content),
            final_url,
            ..
        } => Ok((final_url.unwrap_or_else(|| url.to_string()), content)),
        other => Err(proxy_failure(other)),
    }
}

const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8"),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("upgrade-insecure-requests", "1"),
];

/// Proxy backed by a second HTTP client that presents a full browser header set
pub struct HttpFetchProxy {
    client: Client,
}

impl HttpFetchProxy {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        for &(name, value) in BROWSER_HEADERS {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("Failed to create proxy HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchProxy for HttpFetchProxy {
    async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        debug!("Proxy {:?} for {}", request.action, request.url);

        let response = match self.client.get(&request.url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Proxy fetch failed for {}: {}", request.url, e);
                return ProxyResponse::failure(e.to_string());
            }
        };

        let final_url = response.url().to_string();
        match request.action {
            ProxyAction::AnalyzeUrl => ProxyResponse::resolved(final_url),
            ProxyAction::FetchContent => {
                let status = response.status();
                if !status.is_success() {
                    return ProxyResponse::failure(format!("HTTP {}", status.as_u16()));
                }
                match response.text().await {
                    Ok(content) => ProxyResponse::content(final_url, content),
                    Err(e) => ProxyResponse::failure(e.to_string()),
                }
            }
        }
    }
}
