//! Canonicalization, validation, deduplication and ordering
//!
//! Pure functions only; no I/O. The extractor produces a [`RawHarvest`] and the
//! [`Normalizer`] turns it into an ordered, duplicate-free [`ExtractionBundle`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

use crate::domain::bundle::ExtractionBundle;
use crate::domain::platform::{Platform, host_matches, strip_host_prefix};

/// Sentinel for missing values, kept for compatibility with listing exports
pub const NOT_AVAILABLE: &str = "N/A";

static TRACKING_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[?&](?:ref|source|via|utm_[a-z_]+)=").expect("tracking pattern is valid")
});

static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").expect("email pattern is valid")
});

const ASSET_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".css", ".js", ".avif", ".bmp",
];

const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com", "example.org", "test.com", "domain.com", "email.com", "yourdomain.com",
    "yourcompany.com", "company.com", "sentry.io", "wixpress.com", "sentry-next.wixpress.com",
];

const PLACEHOLDER_LOCAL_PARTS: &[&str] = &[
    "user", "name", "email", "noreply", "no-reply", "your", "yourname", "you", "firstname",
    "first.last", "john.doe", "jane.doe", "username",
];

/// Strip tracking parameters (`ref`, `source`, `via`, `utm_*`) and everything
/// after them. Idempotent; blank input becomes [`NOT_AVAILABLE`].
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    let mut cleaned = match TRACKING_PARAM.find(trimmed) {
        Some(found) => &trimmed[..found.start()],
        None => trimmed,
    };
    while let Some(rest) = cleaned.strip_suffix(['?', '&']) {
        cleaned = rest;
    }

    if cleaned.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Canonical social profile
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocialProfile {
    pub platform: Platform,
    pub profile_path: String,
}

impl SocialProfile {
    pub fn url(&self) -> String {
        format!(
            "https://{}{}",
            self.platform.strategy().canonical_domain,
            self.profile_path
        )
    }
}

/// Parse a candidate that may be scheme-relative, schemeless or JSON-escaped.
pub fn parse_loose_url(raw: &str) -> Option<Url> {
    let unescaped = raw.trim().replace("\\/", "/");
    let candidate = unescaped.trim_end_matches(['.', ',', ';', ':', ')', '\'', '"', '\\']);
    if candidate.is_empty() {
        return None;
    }

    let absolute = if candidate.starts_with("//") {
        format!("https:{candidate}")
    } else if candidate.contains("://") {
        candidate.to_string()
    } else {
        format!("https://{candidate}")
    };

    let url = Url::parse(&absolute).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Canonicalize a social link. `None` when the host is not on a platform
/// allow-list or the path does not identify a profile.
pub fn canonicalize_social(raw: &str) -> Option<SocialProfile> {
    let url = parse_loose_url(raw)?;
    let host = strip_host_prefix(url.host_str()?);
    let platform = Platform::for_host(&host)?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|parts| parts.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default();
    let profile_path = platform.strategy().profile_path(&host, &segments)?;
    Some(SocialProfile {
        platform,
        profile_path,
    })
}

/// Lower-cased address without a `mailto:` prefix or query
pub fn normalize_email(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("mailto:"))
        .map_or(trimmed, |_| &trimmed[7..]);
    without_scheme
        .split('?')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches('.')
        .to_lowercase()
}

/// Validate a normalized email address
pub fn is_valid_email(email: &str, source_domain: Option<&str>) -> bool {
    if !email.contains('@') || !email.contains('.') || !EMAIL_SHAPE.is_match(email) {
        return false;
    }
    if ASSET_SUFFIXES.iter().any(|suffix| email.ends_with(suffix)) || email.contains("@2x") {
        return false;
    }

    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if PLACEHOLDER_LOCAL_PARTS.contains(&local) {
        return false;
    }
    if PLACEHOLDER_DOMAINS
        .iter()
        .any(|placeholder| host_matches(domain, placeholder))
    {
        return false;
    }
    if let Some(source) = source_domain {
        if host_matches(domain, source) {
            return false;
        }
    }
    true
}

/// Digit string used for phone validation and deduplication
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Accepts 10 to 15 digits; returns the trimmed display form
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches("tel:").trim();
    let digits = phone_digits(trimmed);
    (10..=15)
        .contains(&digits.len())
        .then(|| trimmed.to_string())
}

/// Unordered harvest of one document before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHarvest {
    pub social_urls: Vec<String>,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub signup_urls: Vec<String>,
}

impl RawHarvest {
    pub fn extend(&mut self, other: Self) {
        self.social_urls.extend(other.social_urls);
        self.emails.extend(other.emails);
        self.phone_numbers.extend(other.phone_numbers);
        self.signup_urls.extend(other.signup_urls);
    }
}

/// Normalization settings shared by every document of a batch
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub max_emails: usize,
    /// Service the work items came from; its addresses are never reported
    pub source_domain: Option<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            max_emails: 5,
            source_domain: None,
        }
    }
}

impl Normalizer {
    pub fn new(max_emails: usize, source_domain: Option<String>) -> Self {
        Self {
            max_emails,
            source_domain,
        }
    }

    pub fn normalize(&self, raw: RawHarvest, destination_host: Option<&str>) -> ExtractionBundle {
        ExtractionBundle {
            social_urls: dedup_social(&raw.social_urls),
            emails: self.rank_emails(&raw.emails, destination_host),
            phone_numbers: dedup_phones(&raw.phone_numbers),
            signup_urls: dedup_signup(&raw.signup_urls),
            guessed: Default::default(),
        }
    }

    /// Valid, case-insensitively unique emails; destination-domain addresses
    /// first, then first-seen order, capped at `max_emails`.
    pub fn rank_emails(&self, candidates: &[String], destination_host: Option<&str>) -> Vec<String> {
        let destination = destination_host.map(strip_host_prefix);
        let mut seen = HashSet::new();
        let mut valid: Vec<String> = candidates
            .iter()
            .map(|candidate| normalize_email(candidate))
            .filter(|email| is_valid_email(email, self.source_domain.as_deref()))
            .filter(|email| seen.insert(email.clone()))
            .collect();

        if let Some(destination) = destination.as_deref() {
            // Stable sort keeps first-seen order inside each group.
            valid.sort_by_key(|email| {
                let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
                !(host_matches(domain, destination) || host_matches(destination, domain))
            });
        }
        valid.truncate(self.max_emails);
        valid
    }
}

/// Canonical, unique social URLs grouped by platform priority
pub fn dedup_social(candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut profiles: Vec<SocialProfile> = candidates
        .iter()
        .filter_map(|candidate| canonicalize_social(candidate))
        .filter(|profile| seen.insert(profile.clone()))
        .collect();
    profiles.sort_by_key(|profile| profile.platform.priority());
    profiles.iter().map(SocialProfile::url).collect()
}

pub fn dedup_phones(candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter_map(|candidate| normalize_phone(candidate))
        .filter(|phone| seen.insert(phone_digits(phone)))
        .collect()
}

pub fn dedup_signup(candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter_map(|candidate| Url::parse(candidate.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
