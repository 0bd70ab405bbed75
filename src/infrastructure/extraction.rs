//! Contact and social-presence extraction
//!
//! A document is run through a fixed list of independent [`ExtractionPass`]es.
//! Each pass appends candidates to a [`RawHarvest`]; the domain
//! [`Normalizer`] then validates, deduplicates and orders them.

pub mod contacts;
pub mod destination;
pub mod patterns;
pub mod phones;
pub mod signup;
pub mod social;

use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::domain::bundle::ExtractionBundle;
use crate::domain::normalizer::{Normalizer, RawHarvest};
use crate::domain::platform::strip_host_prefix;
use crate::infrastructure::config::ExtractorConfig;

pub use destination::DestinationFinder;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid page URL: {url}")]
    InvalidPageUrl { url: String },
}

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// One parsed document handed to every pass
pub struct PageContext<'a> {
    pub url: &'a Url,
    pub html: &'a str,
    pub document: &'a Html,
}

impl PageContext<'_> {
    /// Resolve `href` against the page URL
    pub fn absolute(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        self.url.join(href).ok()
    }
}

/// Independent harvesting strategy over one document
pub trait ExtractionPass: Send + Sync {
    fn name(&self) -> &'static str;

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest);
}

/// Runs every pass and normalizes the result
pub struct ContactExtractor {
    passes: Vec<Box<dyn ExtractionPass>>,
    max_emails: usize,
    guess_missing: bool,
}

impl ContactExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractionError> {
        let passes: Vec<Box<dyn ExtractionPass>> = vec![
            Box::new(social::InlineScriptPass::new()?),
            Box::new(social::JsonLdPass::new()?),
            Box::new(social::MetaPass::new()?),
            Box::new(social::DataAttributePass::new()?),
            Box::new(social::CssPass::new()?),
            Box::new(social::CommentPass),
            Box::new(social::WidgetPass::new(config.icon_window_chars)?),
            Box::new(social::PlatformCatalogPass),
            Box::new(contacts::ContactSectionPass::new()?),
            Box::new(contacts::ScriptContactPass::new()?),
            Box::new(signup::SignupPass::new(&config.signup_keywords)?),
            Box::new(phones::PhonePass::new()?),
        ];

        Ok(Self {
            passes,
            max_emails: config.max_emails,
            guess_missing: config.guess_missing,
        })
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Mine `html` fetched from `page_url`. Addresses at `source_domain` are
    /// never reported.
    pub fn extract(
        &self,
        page_url: &str,
        html: &str,
        source_domain: Option<&str>,
    ) -> Result<ExtractionBundle, ExtractionError> {
        let url = Url::parse(page_url).map_err(|_| ExtractionError::InvalidPageUrl {
            url: page_url.to_string(),
        })?;
        let document = Html::parse_document(html);
        let page = PageContext {
            url: &url,
            html,
            document: &document,
        };

        let mut raw = RawHarvest::default();
        for pass in &self.passes {
            let mut found = RawHarvest::default();
            pass.harvest(&page, &mut found);
            debug!(
                "Pass {} found {} social, {} email, {} phone, {} signup candidates",
                pass.name(),
                found.social_urls.len(),
                found.emails.len(),
                found.phone_numbers.len(),
                found.signup_urls.len()
            );
            raw.extend(found);
        }

        let normalizer = Normalizer::new(self.max_emails, source_domain.map(str::to_string));
        let mut bundle = normalizer.normalize(raw, url.host_str());

        if self.guess_missing {
            if let Some(host) = url.host_str() {
                apply_guesses(&mut bundle, &strip_host_prefix(host));
            }
        }

        Ok(bundle)
    }
}

/// Fill empty social and email categories with at most two guesses each,
/// derived from the destination host.
fn apply_guesses(bundle: &mut ExtractionBundle, host: &str) {
    let Some(brand) = host.split('.').next().filter(|label| !label.is_empty()) else {
        return;
    };

    if bundle.social_urls.is_empty() {
        bundle.social_urls = vec![
            format!("https://twitter.com/{brand}"),
            format!("https://linkedin.com/company/{brand}"),
        ];
        bundle.guessed.social_urls = true;
    }

    if bundle.emails.is_empty() {
        bundle.emails = vec![format!("hello@{host}"), format!("contact@{host}")];
        bundle.guessed.emails = true;
    }
}
