//! Shared regexes and text helpers for the extraction passes

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::domain::platform::{Platform, generic_social_regex};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("extraction pattern is valid")
}

pub static EMAIL: Lazy<Regex> = Lazy::new(|| compile(r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}"));

pub static CSS_URL: Lazy<Regex> = Lazy::new(|| compile(r#"(?i)url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#));

pub static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<!--(.*?)-->"));

pub static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?s)/\*(.*?)\*/"));

pub static HREF: Lazy<Regex> = Lazy::new(|| compile(r#"(?i)href\s*=\s*["']([^"']+)["']"#));

/// Icon class names and labels that usually sit next to a profile link
pub static ICON_MARKER: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)(?:fa|fab|icon|bi|ri|social|logo|ico)[-_](?:twitter|x-twitter|linkedin|facebook|instagram|youtube|github|tiktok|discord|reddit|medium|pinterest|telegram|threads)\b",
    )
});

pub static SCRIPT_CONTACT: Lazy<Regex> = Lazy::new(|| {
    compile(r#"(?i)["']?(?:e-?mail|mail|contact)["']?\s*[:=]\s*["']([^"'\s]+@[^"'\s]+)["']"#)
});

pub static TELEPHONE_FIELD: Lazy<Regex> = Lazy::new(|| compile(r#"(?i)"telephone"\s*:\s*"([^"]+)""#));

pub static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // E.164-like
        compile(r"\+\d{1,3}[\s.\-]?\(?\d{1,4}\)?(?:[\s.\-]?\d{2,4}){2,4}"),
        // (555) 555-5555
        compile(r"\(\d{3}\)\s?\d{3}[\-.\s]\d{4}"),
        // dashed or spaced groups
        compile(r"\b\d{3}[\-.\s]\d{3}[\-.\s]\d{4}\b"),
    ]
});

/// Social URL literals: platform profile patterns first, then the generic
/// allow-list pattern.
pub fn social_literals(text: &str, out: &mut Vec<String>) {
    let text = text.replace("\\/", "/");
    for platform in Platform::all() {
        out.extend(
            platform
                .profile_regex()
                .find_iter(&text)
                .map(|m| m.as_str().to_string()),
        );
    }
    out.extend(
        generic_social_regex()
            .find_iter(&text)
            .map(|m| m.as_str().to_string()),
    );
}

pub fn emails_in(text: &str, out: &mut Vec<String>) {
    out.extend(EMAIL.find_iter(text).map(|m| m.as_str().to_string()));
}

/// Largest char boundary not above `index`
pub fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Text of the document outside `script`, `style` and `noscript`
pub fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Node::Text(chunk) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| matches!(element.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            text.push_str(chunk);
            text.push(' ');
        }
    }
    text
}

/// Whitespace-collapsed text of one element
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}
