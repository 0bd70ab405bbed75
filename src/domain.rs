//! Domain module - Core entities and normalization rules
//!
//! This module contains the batch entities (work items, outcomes, records),
//! the pipeline event contract, and the pure canonicalization logic that
//! every other layer relies on.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod bundle;
pub mod events;
pub mod normalizer;
pub mod outcome;
pub mod platform;
pub mod record;
pub mod work_item;

// Re-export commonly used items for convenience
pub use bundle::{ExtractionBundle, GuessedCategories};
pub use events::{EventEmitter, PipelineEvent};
pub use normalizer::{NOT_AVAILABLE, Normalizer, RawHarvest, SocialProfile, canonicalize_social, canonicalize_url};
pub use outcome::{ExtractionStatus, RedirectStatus, ResolutionOutcome};
pub use platform::{Platform, PlatformStrategy};
pub use record::{BatchResult, BatchStats, OutputRecord};
pub use work_item::{PipelineState, WorkItem};
