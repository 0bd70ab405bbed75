//! Application layer module
//!
//! This module contains the batch orchestration: the retry policy, the
//! redirect resolver, per-item analysis, the admission scheduler and the
//! pipeline that reports progress on the event channel.

pub mod analyzer;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod scheduler;

// Re-export commonly used items
pub use analyzer::{ItemAnalyzer, UrlAnalyzer};
pub use pipeline::{AnalysisPipeline, PipelineError};
pub use resolver::{ResolveError, Resolver};
pub use retry::{Backoff, RetryPolicy, retry_with_policy};
pub use scheduler::{Scheduler, admission_delay};
