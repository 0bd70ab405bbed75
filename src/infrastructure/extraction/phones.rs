//! Phone number pass

use scraper::Selector;
use std::ops::Range;

use super::patterns::{PHONE_PATTERNS, TELEPHONE_FIELD, visible_text};
use super::{ExtractionError, ExtractionPass, PageContext, selector};
use crate::domain::normalizer::RawHarvest;

/// Phone-shaped runs in visible text, `tel:` links and `"telephone"` fields
pub struct PhonePass {
    tel_links: Selector,
}

impl PhonePass {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            tel_links: selector(r#"a[href^="tel:" i]"#)?,
        })
    }

    /// Matches from every pattern, earlier patterns winning overlaps
    fn scan_text(text: &str, out: &mut Vec<String>) {
        let mut taken: Vec<Range<usize>> = Vec::new();
        for pattern in PHONE_PATTERNS.iter() {
            for found in pattern.find_iter(text) {
                let span = found.range();
                if taken.iter().any(|used| used.start < span.end && span.start < used.end) {
                    continue;
                }
                taken.push(span);
                out.push(found.as_str().trim().to_string());
            }
        }
    }
}

impl ExtractionPass for PhonePass {
    fn name(&self) -> &'static str {
        "phones"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        Self::scan_text(&visible_text(page.document), &mut harvest.phone_numbers);

        for link in page.document.select(&self.tel_links) {
            if let Some(href) = link.value().attr("href") {
                let number = href.get(4..).unwrap_or_default();
                harvest.phone_numbers.push(number.to_string());
            }
        }

        harvest.phone_numbers.extend(
            TELEPHONE_FIELD
                .captures_iter(page.html)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        );
    }
}
