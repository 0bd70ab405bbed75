//! linkmine - Batch redirect resolution and contact mining
//!
//! Follows listing redirect URLs to the external destination they point at,
//! then mines the destination page for social profiles, emails, phone
//! numbers and sign-up endpoints.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;

#[doc(hidden)]
pub mod test_utils;
