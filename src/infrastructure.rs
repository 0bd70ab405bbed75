//! Infrastructure layer for HTTP access, markup extraction and file I/O
//!
//! This module provides the HTTP client and fetch proxy, the contact
//! extraction passes, configuration loading, logging, and the readers and
//! writers for work item listings and result exports.

pub mod config;  // Layered configuration (file + environment)
pub mod export;  // CSV / JSON result writers
pub mod extraction;  // Contact extraction passes and destination recovery
pub mod fetch_error;
pub mod fetch_proxy;  // Privileged fetch proxy contract
pub mod http_client;
pub mod listing;  // Work item listing source
pub mod logging;  // Logging infrastructure

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, ConfigManager};
pub use export::{ExportError, ResultExporter};
pub use extraction::{ContactExtractor, DestinationFinder, ExtractionError};
pub use fetch_error::FetchError;
pub use fetch_proxy::{FetchProxy, HttpFetchProxy, ProxyAction, ProxyRequest, ProxyResponse};
pub use http_client::{FetchedPage, HttpClient, PageFetcher};
pub use listing::{JsonListingSource, ListingError};
