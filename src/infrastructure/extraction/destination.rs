//! Destination recovery from a listing page's markup
//!
//! Used by the resolver when redirects never leave the source service.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::patterns::element_text;
use super::{ExtractionError, selector};
use crate::domain::normalizer::canonicalize_url;
use crate::domain::platform::{Platform, host_matches, strip_host_prefix};

static WEBSITE_URL_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""website_url"\s*:\s*"([^"]+)""#).expect("website_url pattern is valid")
});

const VISIT_LABELS: &[&str] = &["visit", "visit website", "get it", "website"];

pub struct DestinationFinder {
    anchors: Selector,
    meta_url: Selector,
    canonical: Selector,
    non_destination_domains: Vec<String>,
}

impl DestinationFinder {
    pub fn new(non_destination_domains: &[String]) -> Result<Self, ExtractionError> {
        Ok(Self {
            anchors: selector("a[href]")?,
            meta_url: selector(r#"meta[property="og:url"]"#)?,
            canonical: selector(r#"link[rel="canonical"]"#)?,
            non_destination_domains: non_destination_domains
                .iter()
                .map(|domain| domain.to_lowercase())
                .collect(),
        })
    }

    /// Absolute URL that leaves `source_domain` and is not a known
    /// non-destination (social network, asset CDN)
    pub fn is_destination(&self, candidate: &str, source_domain: &str) -> bool {
        let Ok(url) = Url::parse(candidate) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str().map(strip_host_prefix) else {
            return false;
        };
        !host_matches(&host, source_domain)
            && !self
                .non_destination_domains
                .iter()
                .any(|domain| host_matches(&host, domain))
            && Platform::for_host(&host).is_none()
    }

    /// Scan markup in priority order; first external hit wins
    pub fn find(&self, html: &str, page_url: &Url, source_domain: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let resolve = |raw: &str| -> Option<String> {
            let unescaped = raw.trim().replace("\\/", "/").replace("\\u002F", "/");
            page_url.join(&unescaped).ok().map(|url| url.to_string())
        };
        let accept = |candidate: Option<String>| -> Option<String> {
            candidate.filter(|url| self.is_destination(url, source_domain))
        };

        // JSON payload field
        for caps in WEBSITE_URL_FIELD.captures_iter(html) {
            if let Some(found) = accept(caps.get(1).and_then(|m| resolve(m.as_str()))) {
                debug!("Destination from website_url field: {}", found);
                return Some(canonicalize_url(&found));
            }
        }

        // "Visit website" style or external-class anchors
        for anchor in document.select(&self.anchors) {
            let element = anchor.value();
            let label = element_text(&anchor).to_lowercase();
            let external_class = element
                .attr("class")
                .is_some_and(|class| class.to_lowercase().contains("external"));
            if !VISIT_LABELS.contains(&label.as_str()) && !external_class {
                continue;
            }
            if let Some(found) = accept(element.attr("href").and_then(resolve)) {
                debug!("Destination from labelled anchor: {}", found);
                return Some(canonicalize_url(&found));
            }
        }

        // og:url and canonical link
        let meta = document
            .select(&self.meta_url)
            .filter_map(|meta| meta.value().attr("content"))
            .chain(
                document
                    .select(&self.canonical)
                    .filter_map(|link| link.value().attr("href")),
            );
        for raw in meta {
            if let Some(found) = accept(resolve(raw)) {
                debug!("Destination from meta: {}", found);
                return Some(canonicalize_url(&found));
            }
        }

        // Any other absolute anchor
        for anchor in document.select(&self.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.starts_with("http://") && !href.starts_with("https://") {
                continue;
            }
            if let Some(found) = accept(resolve(href)) {
                debug!("Destination from generic anchor: {}", found);
                return Some(canonicalize_url(&found));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ResolverConfig;

    fn finder() -> DestinationFinder {
        DestinationFinder::new(&ResolverConfig::default().non_destination_domains).unwrap()
    }

    fn page_url() -> Url {
        Url::parse("https://www.service.example/posts/42").unwrap()
    }

    #[test]
    fn test_website_url_field_wins() {
        let html = r#"<script>{"website_url":"https:\/\/acme.io\/?ref=service"}</script>
            <a href="https://other.io/" class="external">Other</a>"#;
        assert_eq!(
            finder().find(html, &page_url(), "service.example"),
            Some("https://acme.io/".to_string())
        );
    }

    #[test]
    fn test_visit_anchor_then_generic_anchor() {
        let html = r#"<a href="https://twitter.com/acme">Twitter</a>
            <a href="/topics/ai">AI</a>
            <a href="https://acme.io/?utm_source=service">Visit website</a>"#;
        assert_eq!(
            finder().find(html, &page_url(), "service.example"),
            Some("https://acme.io/".to_string())
        );

        let html = r#"<a href="https://twitter.com/acme">Twitter</a><a href="https://cdn.jsdelivr.net/x.js">cdn</a><a href="https://beta.dev/">Beta</a>"#;
        assert_eq!(
            finder().find(html, &page_url(), "service.example"),
            Some("https://beta.dev/".to_string())
        );
    }

    #[test]
    fn test_source_links_only_yield_nothing() {
        let html = r#"<link rel="canonical" href="https://www.service.example/posts/42"><a href="https://service.example/">Home</a>"#;
        assert_eq!(finder().find(html, &page_url(), "service.example"), None);
    }
}
