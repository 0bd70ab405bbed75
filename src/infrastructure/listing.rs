//! Work item listing source
//!
//! Reads the listing collected from the source service (a JSON array of
//! work items) and reports collection progress through the event channel.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::events::{EventEmitter, PipelineEvent};
use crate::domain::work_item::{PipelineState, WorkItem};

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Failed to read listing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed listing: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse a JSON array of work items
pub fn parse_work_items(json: &str) -> Result<Vec<WorkItem>, ListingError> {
    Ok(serde_json::from_str(json)?)
}

pub struct JsonListingSource {
    path: PathBuf,
}

impl JsonListingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the listing into a fresh pipeline state.
    ///
    /// Emits `scraping_started`, then `scraping_progress` and
    /// `urls_collected` on success or `scraping_error` on failure.
    pub async fn collect(&self, emitter: &EventEmitter) -> Result<PipelineState, ListingError> {
        emitter.emit(PipelineEvent::ScrapingStarted);

        match self.read().await {
            Ok(items) => {
                let count = items.len();
                let usable = items.iter().filter(|item| item.usable_source_url().is_some()).count();
                info!(
                    "📋 Collected {} work items from {} ({} with a source URL)",
                    count,
                    self.path.display(),
                    usable
                );
                emitter.emit(PipelineEvent::ScrapingProgress { count });
                emitter.emit(PipelineEvent::UrlsCollected {
                    count,
                    data: items.clone(),
                });
                Ok(PipelineState::new(items))
            }
            Err(error) => {
                warn!("❌ Listing collection failed: {}", error);
                emitter.emit(PipelineEvent::ScrapingError {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn read(&self) -> Result<Vec<WorkItem>, ListingError> {
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ListingError::Io {
                path: self.path.clone(),
                source,
            })?;
        parse_work_items(&json)
    }
}
