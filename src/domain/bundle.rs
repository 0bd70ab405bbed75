//! Contact and social data mined from one destination page

use serde::{Deserialize, Serialize};

/// Categories populated by the pattern-guess fallback instead of real matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessedCategories {
    pub social_urls: bool,
    pub emails: bool,
}

/// Ordered, duplicate-free harvest of one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionBundle {
    pub social_urls: Vec<String>,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub signup_urls: Vec<String>,
    #[serde(default)]
    pub guessed: GuessedCategories,
}

impl ExtractionBundle {
    pub fn is_empty(&self) -> bool {
        self.social_urls.is_empty()
            && self.emails.is_empty()
            && self.phone_numbers.is_empty()
            && self.signup_urls.is_empty()
    }

    /// Number of entries across all categories
    pub fn len(&self) -> usize {
        self.social_urls.len() + self.emails.len() + self.phone_numbers.len() + self.signup_urls.len()
    }
}
