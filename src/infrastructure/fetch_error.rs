//! Fetch error types
//!
//! Shared by the direct HTTP client and the fetch proxy so the resolver can
//! treat both paths the same way.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Refused with 403 or 451, usually a cross-origin or bot block
    #[error("Blocked with HTTP {status}: {url}")]
    Blocked {
        url: String,
        status: u16,
        final_url: Option<String>,
    },

    #[error("HTTP {status}: {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Request cancelled: {url}")]
    Cancelled { url: String },
}

impl FetchError {
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if error.is_builder() {
            Self::InvalidUrl(url.to_string())
        } else {
            Self::Network {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True when no HTTP response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network { .. } | Self::Proxy(_) | Self::Cancelled { .. }
        )
    }

    /// Blocked and status errors still observed a URL on the remote side
    pub fn observed_url(&self) -> Option<&str> {
        match self {
            Self::Blocked {
                final_url: Some(url), ..
            } => Some(url),
            Self::Blocked { url, .. } | Self::Status { url, .. } => Some(url),
            _ => None,
        }
    }
}
