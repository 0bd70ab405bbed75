//! Sign-up endpoint pass

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

use super::patterns::element_text;
use super::{ExtractionError, ExtractionPass, PageContext, selector};
use crate::domain::normalizer::RawHarvest;

static SIGNUP_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/(?:sign-?up|register|join|get-started|start-free|free-trial|login|sign-?in|demo)(?:[/?#]|$)")
        .expect("signup path pattern is valid")
});

/// Anchors, buttons, submit inputs and forms whose label matches a keyword
pub struct SignupPass {
    keywords: Vec<String>,
    anchors: Selector,
    buttons: Selector,
    forms: Selector,
}

impl SignupPass {
    pub fn new(keywords: &[String]) -> Result<Self, ExtractionError> {
        Ok(Self {
            keywords: keywords.iter().map(|keyword| keyword.to_lowercase()).collect(),
            anchors: selector("a[href]")?,
            buttons: selector(r#"button, input[type="submit"], input[type="button"]"#)?,
            forms: selector("form")?,
        })
    }

    fn label(element: &ElementRef<'_>) -> String {
        let value = element.value();
        let mut label = element_text(element);
        for attribute in ["value", "aria-label", "title"] {
            if let Some(text) = value.attr(attribute) {
                label.push(' ');
                label.push_str(text);
            }
        }
        label.to_lowercase()
    }

    fn matches(&self, label: &str) -> bool {
        self.keywords.iter().any(|keyword| label.contains(keyword.as_str()))
    }

    /// Where a button leads: its own `formaction`, the enclosing form, or the
    /// enclosing anchor
    fn button_target(button: &ElementRef<'_>) -> Option<String> {
        if let Some(action) = button.value().attr("formaction") {
            return Some(action.to_string());
        }
        button
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find_map(|ancestor| match ancestor.value().name() {
                "form" => ancestor.value().attr("action"),
                "a" => ancestor.value().attr("href"),
                _ => None,
            })
            .map(str::to_string)
    }
}

impl ExtractionPass for SignupPass {
    fn name(&self) -> &'static str {
        "signup"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for anchor in page.document.select(&self.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if self.matches(&Self::label(&anchor)) || SIGNUP_PATH.is_match(href) {
                if let Some(url) = page.absolute(href) {
                    harvest.signup_urls.push(url.to_string());
                }
            }
        }

        for button in page.document.select(&self.buttons) {
            if !self.matches(&Self::label(&button)) {
                continue;
            }
            if let Some(url) = Self::button_target(&button).and_then(|target| page.absolute(&target)) {
                harvest.signup_urls.push(url.to_string());
            }
        }

        for form in page.document.select(&self.forms) {
            let Some(action) = form.value().attr("action") else {
                continue;
            };
            let mut label = Self::label(&form);
            for control in form.select(&self.buttons) {
                label.push(' ');
                label.push_str(&Self::label(&control));
            }
            if self.matches(&label) || SIGNUP_PATH.is_match(action) {
                if let Some(url) = page.absolute(action) {
                    harvest.signup_urls.push(url.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ExtractorConfig;
    use rstest::rstest;
    use scraper::Html;
    use url::Url;

    fn harvest(html: &str) -> Vec<String> {
        let pass = SignupPass::new(&ExtractorConfig::default().signup_keywords).unwrap();
        let url = Url::parse("https://acme.io/pricing").unwrap();
        let document = Html::parse_document(html);
        let page = PageContext {
            url: &url,
            html,
            document: &document,
        };
        let mut harvest = RawHarvest::default();
        pass.harvest(&page, &mut harvest);
        harvest.signup_urls
    }

    #[test]
    fn test_anchor_text_and_path() {
        let urls = harvest(
            r#"<a href="/app">Start free trial</a><a href="https://app.acme.io/register">Continue</a><a href="/blog">Blog</a>"#,
        );
        assert_eq!(urls, vec!["https://acme.io/app", "https://app.acme.io/register"]);
    }

    #[test]
    fn test_buttons_and_forms() {
        let urls = harvest(
            r#"<form action="/accounts/new"><input type="email"><input type="submit" value="Create account"></form>
               <button aria-label="Sign up" formaction="https://acme.io/onboard">Go</button>"#,
        );
        assert_eq!(
            urls,
            vec!["https://acme.io/accounts/new", "https://acme.io/onboard", "https://acme.io/accounts/new"]
        );
    }

    #[rstest]
    #[case::log_in_text(r#"<a href="/account">Log in</a>"#, "https://acme.io/account")]
    #[case::login_path(r#"<a href="/login">Continue</a>"#, "https://acme.io/login")]
    #[case::sign_in_path(r#"<a href="/users/sign-in?next=/">Enter</a>"#, "https://acme.io/users/sign-in?next=/")]
    #[case::book_a_demo(r#"<a href="/contact-sales">Book a demo</a>"#, "https://acme.io/contact-sales")]
    #[case::demo_path(r#"<a href="https://acme.io/demo">See it live</a>"#, "https://acme.io/demo")]
    #[case::login_button(r#"<button formaction="/auth">Login</button>"#, "https://acme.io/auth")]
    #[case::request_demo_form(
        r#"<form action="/leads"><input type="submit" value="Request a demo"></form>"#,
        "https://acme.io/leads"
    )]
    fn test_login_and_demo_intent(#[case] html: &str, #[case] expected: &str) {
        assert!(harvest(html).iter().any(|url| url == expected));
    }

    #[test]
    fn test_unrelated_links_ignored() {
        assert!(harvest(r#"<a href="/blog/demolition">Read</a><a href="/docs">Docs</a>"#).is_empty());
    }
}
