//! Work items produced by the listing source
//!
//! A `WorkItem` is one candidate redirect URL plus the listing metadata that is
//! carried through to the export untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::normalizer::NOT_AVAILABLE;

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Immutable input unit for one batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "Product Name", alias = "name", default = "not_available")]
    pub name: String,

    #[serde(rename = "Description", alias = "description", default = "not_available")]
    pub description: String,

    #[serde(rename = "Categories", alias = "categories", default = "not_available")]
    pub categories: String,

    /// Listing page of the item on the source service
    #[serde(
        rename = "ProductHunt URL",
        alias = "source_listing_url",
        alias = "sourceListingUrl",
        default = "not_available"
    )]
    pub source_listing_url: String,

    #[serde(rename = "Comments", alias = "comment_count", alias = "commentCount", default = "not_available")]
    pub comment_count: String,

    #[serde(
        rename = "Pods",
        alias = "Upvotes",
        alias = "vote_count",
        alias = "voteCount",
        default = "not_available"
    )]
    pub vote_count: String,

    /// Redirect URL to resolve, or `"N/A"` when the listing had none
    #[serde(
        rename = "Product Id Url",
        alias = "source_url",
        alias = "sourceUrl",
        default = "not_available"
    )]
    pub source_url: String,
}

impl WorkItem {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: not_available(),
            categories: not_available(),
            source_listing_url: not_available(),
            comment_count: not_available(),
            vote_count: not_available(),
            source_url: source_url.into(),
        }
    }

    /// The source URL when it is usable; `None` for empty or sentinel values.
    pub fn usable_source_url(&self) -> Option<&str> {
        let trimmed = self.source_url.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE) {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Items collected by the listing source, handed explicitly to the scheduler
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub items: Vec<WorkItem>,
    pub collected_at: Option<DateTime<Utc>>,
}

impl PipelineState {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            collected_at: Some(Utc::now()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_source_url_is_not_usable() {
        assert_eq!(WorkItem::new("a", "N/A").usable_source_url(), None);
        assert_eq!(WorkItem::new("a", "  ").usable_source_url(), None);
        assert_eq!(
            WorkItem::new("a", " https://x.test/r/p/1 ").usable_source_url(),
            Some("https://x.test/r/p/1")
        );
    }

    #[test]
    fn test_deserialize_listing_keys_and_defaults() {
        let json = r#"{
            "Product Name": "Acme",
            "Pods": "120",
            "Product Id Url": "https://www.producthunt.com/r/p/42"
        }"#;
        let item: WorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.name, "Acme");
        assert_eq!(item.vote_count, "120");
        assert_eq!(item.description, "N/A");
        assert_eq!(item.usable_source_url(), Some("https://www.producthunt.com/r/p/42"));
    }

    #[test]
    fn test_deserialize_snake_case_aliases() {
        let json = r#"{"name": "Beta", "source_url": "https://s.test/r/p/7", "vote_count": "3"}"#;
        let item: WorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.name, "Beta");
        assert_eq!(item.vote_count, "3");
        assert_eq!(item.source_url, "https://s.test/r/p/7");
    }
}
