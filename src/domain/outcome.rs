//! Resolution outcome types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::normalizer::NOT_AVAILABLE;

/// How the source URL related to the final URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectStatus {
    NoRedirect,
    Redirected,
    StillOrigin,
    Invalid,
    TimedOut,
    Error(String),
    Skipped,
}

impl fmt::Display for RedirectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRedirect => write!(f, "No redirect"),
            Self::Redirected => write!(f, "Redirected"),
            Self::StillOrigin => write!(f, "Still origin"),
            Self::Invalid => write!(f, "Invalid URL"),
            Self::TimedOut => write!(f, "Timed out"),
            Self::Error(message) => write!(f, "Error: {message}"),
            Self::Skipped => write!(f, "Skipped - No URL"),
        }
    }
}

/// Classification of how far resolution got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// An external destination was reached
    Success,
    /// Every strategy ran but the URL never left the source domain
    Partial,
    Skipped,
    Failed,
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "Success",
            Self::Partial => "Partial",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// Result of resolving one work item; produced once and never mutated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionOutcome {
    pub original_url: String,
    pub final_url: String,
    pub redirect_status: RedirectStatus,
    pub extraction_status: ExtractionStatus,
}

impl ResolutionOutcome {
    /// External destination reached. `Redirected` unless the canonical input
    /// already was the destination.
    pub fn resolved(original_url: &str, cleaned_input: &str, final_url: String) -> Self {
        let redirect_status = if final_url == cleaned_input {
            RedirectStatus::NoRedirect
        } else {
            RedirectStatus::Redirected
        };
        Self {
            original_url: original_url.to_string(),
            final_url,
            redirect_status,
            extraction_status: ExtractionStatus::Success,
        }
    }

    pub fn still_origin(original_url: &str, cleaned_input: &str) -> Self {
        Self {
            original_url: original_url.to_string(),
            final_url: cleaned_input.to_string(),
            redirect_status: RedirectStatus::StillOrigin,
            extraction_status: ExtractionStatus::Partial,
        }
    }

    pub fn invalid(original_url: &str) -> Self {
        Self {
            original_url: original_url.to_string(),
            final_url: NOT_AVAILABLE.to_string(),
            redirect_status: RedirectStatus::Invalid,
            extraction_status: ExtractionStatus::Failed,
        }
    }

    pub fn skipped(original_url: &str) -> Self {
        let original_url = if original_url.trim().is_empty() {
            NOT_AVAILABLE
        } else {
            original_url
        };
        Self {
            original_url: original_url.to_string(),
            final_url: NOT_AVAILABLE.to_string(),
            redirect_status: RedirectStatus::Skipped,
            extraction_status: ExtractionStatus::Skipped,
        }
    }

    pub fn timed_out(original_url: &str) -> Self {
        Self::degraded(original_url, RedirectStatus::TimedOut)
    }

    pub fn failed(original_url: &str, message: impl Into<String>) -> Self {
        Self::degraded(original_url, RedirectStatus::Error(message.into()))
    }

    fn degraded(original_url: &str, redirect_status: RedirectStatus) -> Self {
        Self {
            original_url: original_url.to_string(),
            final_url: NOT_AVAILABLE.to_string(),
            redirect_status,
            extraction_status: ExtractionStatus::Failed,
        }
    }

    /// True when an external destination was reached
    pub fn is_resolved(&self) -> bool {
        self.extraction_status == ExtractionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_distinguishes_redirect_from_direct_hit() {
        let redirected = ResolutionOutcome::resolved("u", "https://a.test/r/p/1", "https://acme.io/".into());
        assert_eq!(redirected.redirect_status, RedirectStatus::Redirected);
        assert!(redirected.is_resolved());

        let direct = ResolutionOutcome::resolved("u", "https://acme.io/", "https://acme.io/".into());
        assert_eq!(direct.redirect_status, RedirectStatus::NoRedirect);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(RedirectStatus::Skipped.to_string(), "Skipped - No URL");
        assert_eq!(RedirectStatus::Error("boom".into()).to_string(), "Error: boom");
        assert_eq!(ExtractionStatus::Partial.to_string(), "Partial");
    }

    #[test]
    fn test_skipped_outcome_uses_sentinel_for_blank_input() {
        let outcome = ResolutionOutcome::skipped("");
        assert_eq!(outcome.original_url, "N/A");
        assert_eq!(outcome.final_url, "N/A");
        assert_eq!(outcome.extraction_status, ExtractionStatus::Skipped);
    }
}
