//! Social-link passes

use scraper::Selector;
use serde_json::Value;
use tracing::debug;

use super::patterns::{
    BLOCK_COMMENT, CSS_URL, HREF, HTML_COMMENT, ICON_MARKER, TELEPHONE_FIELD, emails_in,
    floor_boundary, social_literals,
};
use super::{ExtractionError, ExtractionPass, PageContext, selector};
use crate::domain::normalizer::RawHarvest;
use crate::domain::platform::mentions_social_domain;

/// Social URL literals inside inline scripts
pub struct InlineScriptPass {
    scripts: Selector,
}

impl InlineScriptPass {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            scripts: selector(r#"script:not([src]):not([type="application/ld+json"])"#)?,
        })
    }
}

impl ExtractionPass for InlineScriptPass {
    fn name(&self) -> &'static str {
        "inline_scripts"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for script in page.document.select(&self.scripts) {
            let body: String = script.text().collect();
            social_literals(&body, &mut harvest.social_urls);
        }
    }
}

/// Structured data blocks; falls back to a regex scan when the JSON is invalid
pub struct JsonLdPass {
    blocks: Selector,
}

impl JsonLdPass {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            blocks: selector(r#"script[type="application/ld+json"]"#)?,
        })
    }

    fn walk(value: &Value, harvest: &mut RawHarvest) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match key.as_str() {
                        "sameAs" | "url" => Self::collect_strings(child, &mut harvest.social_urls),
                        "email" => Self::collect_strings(child, &mut harvest.emails),
                        "telephone" => Self::collect_strings(child, &mut harvest.phone_numbers),
                        _ => Self::walk(child, harvest),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::walk(item, harvest);
                }
            }
            _ => {}
        }
    }

    fn collect_strings(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(text) => out.push(text.clone()),
            Value::Array(items) => {
                for item in items {
                    Self::collect_strings(item, out);
                }
            }
            _ => {}
        }
    }
}

impl ExtractionPass for JsonLdPass {
    fn name(&self) -> &'static str {
        "json_ld"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for block in page.document.select(&self.blocks) {
            let body: String = block.text().collect();
            match serde_json::from_str::<Value>(body.trim()) {
                Ok(value) => Self::walk(&value, harvest),
                Err(e) => {
                    debug!("Malformed JSON-LD on {}: {}", page.url, e);
                    social_literals(&body, &mut harvest.social_urls);
                    emails_in(&body, &mut harvest.emails);
                    harvest.phone_numbers.extend(
                        TELEPHONE_FIELD
                            .captures_iter(&body)
                            .filter_map(|caps| caps.get(1))
                            .map(|m| m.as_str().to_string()),
                    );
                }
            }
        }
    }
}

/// `og:url`, `twitter:*` and any meta content on a social host
pub struct MetaPass {
    metas: Selector,
}

impl MetaPass {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            metas: selector("meta[content]")?,
        })
    }
}

impl ExtractionPass for MetaPass {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for meta in page.document.select(&self.metas) {
            let element = meta.value();
            let key = element
                .attr("property")
                .or_else(|| element.attr("name"))
                .unwrap_or_default()
                .to_lowercase();
            let Some(content) = element.attr("content").map(str::trim) else {
                continue;
            };

            match key.as_str() {
                "og:url" | "twitter:url" => harvest.social_urls.push(content.to_string()),
                "twitter:site" | "twitter:creator" => {
                    let handle = content.trim_start_matches('@');
                    if !handle.is_empty() && !handle.contains('/') {
                        harvest.social_urls.push(format!("https://twitter.com/{handle}"));
                    } else {
                        harvest.social_urls.push(content.to_string());
                    }
                }
                _ if mentions_social_domain(content) => harvest.social_urls.push(content.to_string()),
                _ => {}
            }
        }
    }
}

/// `data-*` attribute values mentioning a social domain
pub struct DataAttributePass {
    all: Selector,
}

impl DataAttributePass {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self { all: selector("*")? })
    }
}

impl ExtractionPass for DataAttributePass {
    fn name(&self) -> &'static str {
        "data_attributes"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for element in page.document.select(&self.all) {
            for (name, value) in element.value().attrs() {
                if !name.starts_with("data-") || !mentions_social_domain(value) {
                    continue;
                }
                let before = harvest.social_urls.len();
                social_literals(value, &mut harvest.social_urls);
                if harvest.social_urls.len() == before && !value.contains(char::is_whitespace) {
                    harvest.social_urls.push(value.to_string());
                }
            }
        }
    }
}

/// `url(...)` references in style sheets and style attributes
pub struct CssPass {
    styled: Selector,
}

impl CssPass {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            styled: selector("style, [style]")?,
        })
    }
}

impl ExtractionPass for CssPass {
    fn name(&self) -> &'static str {
        "css"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for element in page.document.select(&self.styled) {
            let mut css: String = element.text().collect();
            if let Some(inline) = element.value().attr("style") {
                css.push_str(inline);
            }
            harvest.social_urls.extend(
                CSS_URL
                    .captures_iter(&css)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
            );
        }
    }
}

/// HTML and block comments: commented-out profile links and addresses
pub struct CommentPass;

impl ExtractionPass for CommentPass {
    fn name(&self) -> &'static str {
        "comments"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for regex in [&*HTML_COMMENT, &*BLOCK_COMMENT] {
            for caps in regex.captures_iter(page.html) {
                if let Some(body) = caps.get(1) {
                    social_literals(body.as_str(), &mut harvest.social_urls);
                    emails_in(body.as_str(), &mut harvest.emails);
                }
            }
        }
    }
}

const WIDGET_HINTS: &[&str] = &["social", "follow", "connect", "footer", "header", "contact", "community"];

/// Anchors inside social/footer-like containers, plus icon-adjacent links
pub struct WidgetPass {
    containers: Selector,
    anchors: Selector,
    icon_window_chars: usize,
}

impl WidgetPass {
    pub fn new(icon_window_chars: usize) -> Result<Self, ExtractionError> {
        Ok(Self {
            containers: selector("[class], [id], footer, header, nav")?,
            anchors: selector("a[href]")?,
            icon_window_chars,
        })
    }

    fn is_widget(element: &scraper::node::Element) -> bool {
        if matches!(element.name(), "footer" | "header") {
            return true;
        }
        let hints = format!(
            "{} {}",
            element.attr("class").unwrap_or_default(),
            element.id().unwrap_or_default()
        )
        .to_lowercase();
        WIDGET_HINTS.iter().any(|hint| hints.contains(hint))
    }

    /// Nearest `href` within the window around each icon marker
    fn icon_adjacent(&self, html: &str, out: &mut Vec<String>) {
        for marker in ICON_MARKER.find_iter(html) {
            let start = floor_boundary(html, marker.start().saturating_sub(self.icon_window_chars));
            let end = floor_boundary(html, marker.end() + self.icon_window_chars);
            let window = &html[start..end];
            let center = marker.start() - start;

            let nearest = HREF
                .captures_iter(window)
                .filter_map(|caps| caps.get(1))
                .min_by_key(|m| m.start().abs_diff(center));
            if let Some(href) = nearest {
                out.push(href.as_str().to_string());
            }
        }
    }
}

impl ExtractionPass for WidgetPass {
    fn name(&self) -> &'static str {
        "widgets"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        for container in page.document.select(&self.containers) {
            if !Self::is_widget(container.value()) {
                continue;
            }
            for anchor in container.select(&self.anchors) {
                if let Some(url) = anchor.value().attr("href").and_then(|href| page.absolute(href)) {
                    harvest.social_urls.push(url.to_string());
                }
            }
        }
        self.icon_adjacent(page.html, &mut harvest.social_urls);
    }
}

/// Every platform's profile pattern, then the generic allow-list pattern
pub struct PlatformCatalogPass;

impl ExtractionPass for PlatformCatalogPass {
    fn name(&self) -> &'static str {
        "platform_catalog"
    }

    fn harvest(&self, page: &PageContext<'_>, harvest: &mut RawHarvest) {
        social_literals(page.html, &mut harvest.social_urls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use url::Url;

    fn run(pass: &dyn ExtractionPass, html: &str) -> RawHarvest {
        let url = Url::parse("https://acme.io/").unwrap();
        let document = Html::parse_document(html);
        let page = PageContext {
            url: &url,
            html,
            document: &document,
        };
        let mut harvest = RawHarvest::default();
        pass.harvest(&page, &mut harvest);
        harvest
    }

    #[test]
    fn test_json_ld_walks_nested_values() {
        let html = r#"<script type="application/ld+json">
            {"@graph": [{"sameAs": "https://twitter.com/acme"}, {"contactPoint": {"email": "hi@acme.io", "telephone": "+1-415-555-0100"}}]}
        </script>"#;
        let harvest = run(&JsonLdPass::new().unwrap(), html);
        assert_eq!(harvest.social_urls, vec!["https://twitter.com/acme"]);
        assert_eq!(harvest.emails, vec!["hi@acme.io"]);
        assert_eq!(harvest.phone_numbers, vec!["+1-415-555-0100"]);
    }

    #[test]
    fn test_json_ld_falls_back_to_regex() {
        let html = r#"<script type="application/ld+json">
            {"sameAs": ["https://github.com/acme",], "email": "hi@acme.io", "telephone": "+1 415 555 0100",}
        </script>"#;
        let harvest = run(&JsonLdPass::new().unwrap(), html);
        assert!(harvest.social_urls.iter().any(|url| url == "https://github.com/acme"));
        assert_eq!(harvest.emails, vec!["hi@acme.io"]);
        assert_eq!(harvest.phone_numbers, vec!["+1 415 555 0100"]);
    }

    #[test]
    fn test_meta_handles_become_urls() {
        let html = r#"<head><meta name="twitter:creator" content="@founder"><meta property="og:see_also" content="https://www.instagram.com/acme"></head>"#;
        let harvest = run(&MetaPass::new().unwrap(), html);
        assert_eq!(
            harvest.social_urls,
            vec!["https://twitter.com/founder", "https://www.instagram.com/acme"]
        );
    }

    #[test]
    fn test_data_attributes_and_css() {
        let html = r#"<div data-share="https://www.facebook.com/acme" data-id="42"></div>
            <span style="background: url('https://cdn.acme.io/bg.png')"></span>"#;
        let harvest = run(&DataAttributePass::new().unwrap(), html);
        assert!(harvest.social_urls.iter().any(|url| url.contains("facebook.com/acme")));

        let harvest = run(&CssPass::new().unwrap(), html);
        assert_eq!(harvest.social_urls, vec!["https://cdn.acme.io/bg.png"]);
    }

    #[test]
    fn test_comments_are_scanned() {
        let html = "<!-- old footer: https://twitter.com/acme_old press@acme.io -->";
        let harvest = run(&CommentPass, html);
        assert!(harvest.social_urls.iter().any(|url| url == "https://twitter.com/acme_old"));
        assert_eq!(harvest.emails, vec!["press@acme.io"]);
    }

    #[test]
    fn test_widget_container_and_icon_window() {
        let html = r#"<div class="follow-us"><a href="/tw">Twitter</a></div>
            <div><a href="https://www.youtube.com/@acme"><svg class="icon-youtube"></svg></a></div>"#;
        let harvest = run(&WidgetPass::new(400).unwrap(), html);
        assert!(harvest.social_urls.contains(&"https://acme.io/tw".to_string()));
        assert!(harvest.social_urls.contains(&"https://www.youtube.com/@acme".to_string()));
    }
}
