//! Email passes

use scraper::Selector;

use super::patterns::{SCRIPT_CONTACT, element_text, emails_in};
use super::{ExtractionError, ExtractionPass, PageContext, selector};
use crate::domain::normalizer::RawHarvest;

const SECTION_HINTS: &[&str] = &["contact", "footer", "about"];
const EMAIL_ATTRIBUTES: &[&str] = &["data-email", "data-mail", "data-contact", "data-address"];

/// Emails in contact/footer/about sections, `mailto:` links and `data-email`
/// style attributes
pub struct ContactSectionPass {
    sections: Selector,
    mailto: Selector,
    email_attributes: Selector,
}

impl ContactSectionPass {
    pub fn new() -> Result<Self, ExtractionError> {
        let attribute_selector = EMAIL_ATTRIBUTES
            .iter()
            .map(|name| format!("[{name}]"))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Self {
            sections: selector("footer, address, [class], [id]")?,
            mailto: selector(r#"a[href^="mailto:" i]"#)?,
            email_attributes: selector(&attribute_selector)?,
        })
    }

    fn is_section(element: &scraper::node::Element) -> bool {
        if matches!(element.name(), "footer" | "address") {
            return true;
        }
        let hints = format!(
            "{} {}",
            element.attr("class").unwrap_or_default(),
            element.id().unwrap_or_default()
        )
        .to_lowercase();
        SECTION_HINTS.iter().any(|hint| hints.contains(hint))
    }
}

impl ExtractionPass for ContactSectionPass {
    fn name(&self) -> &'static str {
        "contact_sections"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for anchor in page.document.select(&self.mailto) {
            if let Some(href) = anchor.value().attr("href") {
                harvest.emails.push(href.to_string());
            }
        }

        for section in page.document.select(&self.sections) {
            if Self::is_section(section.value()) {
                emails_in(&element_text(&section), &mut harvest.emails);
            }
        }

        for element in page.document.select(&self.email_attributes) {
            for name in EMAIL_ATTRIBUTES {
                if let Some(value) = element.value().attr(name) {
                    emails_in(value, &mut harvest.emails);
                }
            }
        }
    }
}

/// `email: "..."` style literals inside scripts
pub struct ScriptContactPass {
    scripts: Selector,
}

impl ScriptContactPass {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            scripts: selector("script")?,
        })
    }
}

impl ExtractionPass for ScriptContactPass {
    fn name(&self) -> &'static str {
        "script_contacts"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for script in page.document.select(&self.scripts) {
            let body: String = script.text().collect();
            harvest.emails.extend(
                SCRIPT_CONTACT
                    .captures_iter(&body)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
            );
        }
    }
}
