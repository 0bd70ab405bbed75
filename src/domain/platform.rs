//! Social platform strategy table
//!
//! Every supported network is described by one [`PlatformStrategy`] row:
//! canonical domain, alias domains, the profile regex used by the catalog
//! pass, a path normalizer and case sensitivity. Table order is the output
//! priority order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    LinkedIn,
    Facebook,
    Instagram,
    YouTube,
    GitHub,
    TikTok,
    Discord,
    Reddit,
    Medium,
    Pinterest,
    Telegram,
    Threads,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().label)
    }
}

type PathNormalizer = fn(&str, &[&str]) -> Option<String>;

/// One row of the strategy table
pub struct PlatformStrategy {
    pub platform: Platform,
    pub label: &'static str,
    pub canonical_domain: &'static str,
    pub aliases: &'static [&'static str],
    /// Host-and-path pattern of a profile link, without scheme
    pub profile_pattern: &'static str,
    pub case_sensitive: bool,
    normalize_path: PathNormalizer,
}

impl fmt::Debug for PlatformStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformStrategy")
            .field("platform", &self.platform)
            .field("canonical_domain", &self.canonical_domain)
            .field("aliases", &self.aliases)
            .field("case_sensitive", &self.case_sensitive)
            .finish_non_exhaustive()
    }
}

impl PlatformStrategy {
    /// Canonical domain followed by the aliases
    pub fn domains(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.canonical_domain).chain(self.aliases.iter().copied())
    }

    pub fn owns_host(&self, host: &str) -> bool {
        self.domains().any(|domain| host_matches(host, domain))
    }

    /// Profile path (leading `/`) for a URL on one of this platform's hosts
    pub fn profile_path(&self, host: &str, segments: &[&str]) -> Option<String> {
        let path = (self.normalize_path)(host, segments)?;
        Some(if self.case_sensitive { path } else { path.to_lowercase() })
    }
}

/// `host` equals `domain` or is a subdomain of it
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

static STRATEGIES: [PlatformStrategy; 13] = [
    PlatformStrategy {
        platform: Platform::Twitter,
        label: "twitter",
        canonical_domain: "twitter.com",
        aliases: &["x.com"],
        profile_pattern: r"(?:twitter|x)\.com/@?[A-Za-z0-9_]{1,15}",
        case_sensitive: false,
        normalize_path: twitter_path,
    },
    PlatformStrategy {
        platform: Platform::LinkedIn,
        label: "linkedin",
        canonical_domain: "linkedin.com",
        aliases: &[],
        profile_pattern: r"linkedin\.com/(?:company|in|school|showcase)/[A-Za-z0-9_%\-]+",
        case_sensitive: false,
        normalize_path: linkedin_path,
    },
    PlatformStrategy {
        platform: Platform::Facebook,
        label: "facebook",
        canonical_domain: "facebook.com",
        aliases: &["fb.com"],
        profile_pattern: r"(?:facebook|fb)\.com/[A-Za-z0-9.\-]+",
        case_sensitive: false,
        normalize_path: facebook_path,
    },
    PlatformStrategy {
        platform: Platform::Instagram,
        label: "instagram",
        canonical_domain: "instagram.com",
        aliases: &[],
        profile_pattern: r"instagram\.com/[A-Za-z0-9_.]+",
        case_sensitive: false,
        normalize_path: instagram_path,
    },
    PlatformStrategy {
        platform: Platform::YouTube,
        label: "youtube",
        canonical_domain: "youtube.com",
        aliases: &[],
        profile_pattern: r"youtube\.com/(?:@[A-Za-z0-9_.\-]+|(?:channel|c|user)/[A-Za-z0-9_\-]+)",
        case_sensitive: true,
        normalize_path: youtube_path,
    },
    PlatformStrategy {
        platform: Platform::GitHub,
        label: "github",
        canonical_domain: "github.com",
        aliases: &[],
        profile_pattern: r"github\.com/[A-Za-z0-9\-]+",
        case_sensitive: false,
        normalize_path: github_path,
    },
    PlatformStrategy {
        platform: Platform::TikTok,
        label: "tiktok",
        canonical_domain: "tiktok.com",
        aliases: &[],
        profile_pattern: r"tiktok\.com/@[A-Za-z0-9_.]+",
        case_sensitive: false,
        normalize_path: at_handle_path,
    },
    PlatformStrategy {
        platform: Platform::Discord,
        label: "discord",
        canonical_domain: "discord.com",
        aliases: &["discord.gg", "discordapp.com"],
        profile_pattern: r"(?:discord\.gg/[A-Za-z0-9\-]+|discord(?:app)?\.com/invite/[A-Za-z0-9\-]+)",
        case_sensitive: true,
        normalize_path: discord_path,
    },
    PlatformStrategy {
        platform: Platform::Reddit,
        label: "reddit",
        canonical_domain: "reddit.com",
        aliases: &[],
        profile_pattern: r"reddit\.com/(?:r|u|user)/[A-Za-z0-9_\-]+",
        case_sensitive: false,
        normalize_path: reddit_path,
    },
    PlatformStrategy {
        platform: Platform::Medium,
        label: "medium",
        canonical_domain: "medium.com",
        aliases: &[],
        profile_pattern: r"(?:medium\.com/@?[A-Za-z0-9_.\-]+|[A-Za-z0-9\-]+\.medium\.com)",
        case_sensitive: false,
        normalize_path: medium_path,
    },
    PlatformStrategy {
        platform: Platform::Pinterest,
        label: "pinterest",
        canonical_domain: "pinterest.com",
        aliases: &[],
        profile_pattern: r"pinterest\.com/[A-Za-z0-9_\-]+",
        case_sensitive: false,
        normalize_path: pinterest_path,
    },
    PlatformStrategy {
        platform: Platform::Telegram,
        label: "telegram",
        canonical_domain: "t.me",
        aliases: &["telegram.me"],
        profile_pattern: r"(?:t|telegram)\.me/[A-Za-z0-9_]+",
        case_sensitive: false,
        normalize_path: telegram_path,
    },
    PlatformStrategy {
        platform: Platform::Threads,
        label: "threads",
        canonical_domain: "threads.net",
        aliases: &[],
        profile_pattern: r"threads\.net/@[A-Za-z0-9_.]+",
        case_sensitive: false,
        normalize_path: at_handle_path,
    },
];

static PROFILE_REGEXES: Lazy<Vec<(Platform, Regex)>> = Lazy::new(|| {
    STRATEGIES
        .iter()
        .map(|strategy| {
            let pattern = format!(
                r"(?i)(?:https?:)?//(?:[a-z0-9\-]+\.)*{}",
                strategy.profile_pattern
            );
            let regex = Regex::new(&pattern).expect("profile pattern is valid");
            (strategy.platform, regex)
        })
        .collect()
});

/// Any link on an allow-listed social host, used after the per-platform patterns
static GENERIC_SOCIAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    let domains: Vec<String> = STRATEGIES
        .iter()
        .flat_map(PlatformStrategy::domains)
        .map(regex::escape)
        .collect();
    let pattern = format!(
        r#"(?i)(?:https?:)?//[a-z0-9.\-]*(?:{})/[^\s"'<>()\\,]*"#,
        domains.join("|")
    );
    Regex::new(&pattern).expect("generic social pattern is valid")
});

impl Platform {
    /// All platforms in priority order
    pub fn all() -> impl Iterator<Item = Self> {
        STRATEGIES.iter().map(|strategy| strategy.platform)
    }

    pub fn strategy(self) -> &'static PlatformStrategy {
        // Table rows are declared in enum order.
        &STRATEGIES[self as usize]
    }

    pub fn priority(self) -> usize {
        self as usize
    }

    /// Platform owning `host` after stripping `www.`, `m.` and `mobile.`
    pub fn for_host(host: &str) -> Option<Self> {
        let host = strip_host_prefix(host);
        STRATEGIES
            .iter()
            .find(|strategy| strategy.owns_host(&host))
            .map(|strategy| strategy.platform)
    }

    pub fn profile_regex(self) -> &'static Regex {
        &PROFILE_REGEXES[self as usize].1
    }
}

pub fn generic_social_regex() -> &'static Regex {
    &GENERIC_SOCIAL_REGEX
}

/// True when `text` mentions any allow-listed social domain
pub fn mentions_social_domain(text: &str) -> bool {
    let lower = text.to_lowercase();
    STRATEGIES
        .iter()
        .flat_map(PlatformStrategy::domains)
        .any(|domain| mentions_host(&lower, domain))
}

/// `domain` occurs in `text` as a whole host or host suffix, so `x.com` is
/// not found inside `netflix.com`
fn mentions_host(text: &str, domain: &str) -> bool {
    text.match_indices(domain).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + domain.len()..].chars().next();
        let opens = before.is_none_or(|c| matches!(c, '/' | '.' | '@' | '"' | '\'') || c.is_whitespace());
        let closes = after.is_none_or(|c| !(c.is_alphanumeric() || c == '-' || c == '.'));
        opens && closes
    })
}

pub fn strip_host_prefix(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    for prefix in ["www.", "m.", "mobile."] {
        if let Some(rest) = host.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    host
}

fn first_segment_not_in<'a>(segments: &[&'a str], reserved: &[&str]) -> Option<&'a str> {
    let first = *segments.first()?;
    let lower = first.to_lowercase();
    if reserved.contains(&lower.as_str()) {
        None
    } else {
        Some(first)
    }
}

fn is_handle(value: &str, extra: &[char]) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || extra.contains(&c))
}

fn twitter_path(_host: &str, segments: &[&str]) -> Option<String> {
    const RESERVED: &[&str] = &[
        "intent", "share", "home", "search", "hashtag", "i", "explore", "notifications",
        "messages", "settings", "login", "signup", "tos", "privacy", "status", "widgets",
    ];
    let handle = first_segment_not_in(segments, RESERVED)?;
    let handle = handle.trim_start_matches('@');
    (handle.len() <= 15 && is_handle(handle, &[])).then(|| format!("/{handle}"))
}

fn linkedin_path(_host: &str, segments: &[&str]) -> Option<String> {
    match segments {
        [kind, name, ..] if ["company", "in", "school", "showcase"].contains(&kind.to_lowercase().as_str()) => {
            is_handle(name, &['-', '%', '.']).then(|| format!("/{}/{name}", kind.to_lowercase()))
        }
        _ => None,
    }
}

fn facebook_path(_host: &str, segments: &[&str]) -> Option<String> {
    const RESERVED: &[&str] = &[
        "sharer", "sharer.php", "share", "share.php", "dialog", "plugins", "tr", "login",
        "help", "policies", "profile.php", "watch", "groups", "events", "hashtag",
    ];
    let name = first_segment_not_in(segments, RESERVED)?;
    is_handle(name, &['.', '-']).then(|| format!("/{name}"))
}

fn instagram_path(_host: &str, segments: &[&str]) -> Option<String> {
    const RESERVED: &[&str] = &["p", "reel", "reels", "explore", "stories", "accounts", "tv", "direct"];
    let name = first_segment_not_in(segments, RESERVED)?;
    is_handle(name, &['.']).then(|| format!("/{name}"))
}

fn youtube_path(_host: &str, segments: &[&str]) -> Option<String> {
    match segments {
        [handle, ..] if handle.starts_with('@') && handle.len() > 1 => Some(format!("/{handle}")),
        [kind, name, ..] if ["channel", "c", "user"].contains(kind) => {
            is_handle(name, &['-']).then(|| format!("/{kind}/{name}"))
        }
        _ => None,
    }
}

fn github_path(_host: &str, segments: &[&str]) -> Option<String> {
    const RESERVED: &[&str] = &[
        "features", "about", "pricing", "login", "join", "sponsors", "marketplace", "topics",
        "explore", "settings", "orgs", "enterprise", "security", "site",
    ];
    let owner = first_segment_not_in(segments, RESERVED)?;
    is_handle(owner, &['-']).then(|| format!("/{owner}"))
}

fn at_handle_path(_host: &str, segments: &[&str]) -> Option<String> {
    let handle = segments.first()?;
    let name = handle.strip_prefix('@')?;
    is_handle(name, &['.']).then(|| format!("/{handle}"))
}

fn discord_path(host: &str, segments: &[&str]) -> Option<String> {
    let code = if host_matches(host, "discord.gg") {
        segments.first()?
    } else {
        match segments {
            [invite, code, ..] if *invite == "invite" => code,
            _ => return None,
        }
    };
    is_handle(code, &['-']).then(|| format!("/invite/{code}"))
}

fn reddit_path(_host: &str, segments: &[&str]) -> Option<String> {
    match segments {
        [kind, name, ..] => {
            let kind = match kind.to_lowercase().as_str() {
                "r" => "r",
                "u" | "user" => "u",
                _ => return None,
            };
            is_handle(name, &['-']).then(|| format!("/{kind}/{name}"))
        }
        _ => None,
    }
}

fn medium_path(host: &str, segments: &[&str]) -> Option<String> {
    if let Some(publication) = host.strip_suffix(".medium.com") {
        return is_handle(publication, &['-']).then(|| format!("/@{publication}"));
    }
    const RESERVED: &[&str] = &["m", "tag", "search", "plans", "about", "membership", "me", "topics"];
    let name = first_segment_not_in(segments, RESERVED)?;
    let bare = name.trim_start_matches('@');
    is_handle(bare, &['.', '-']).then(|| format!("/{name}"))
}

fn pinterest_path(_host: &str, segments: &[&str]) -> Option<String> {
    const RESERVED: &[&str] = &["pin", "search", "ideas", "today", "_", "business"];
    let name = first_segment_not_in(segments, RESERVED)?;
    is_handle(name, &['-']).then(|| format!("/{name}"))
}

fn telegram_path(_host: &str, segments: &[&str]) -> Option<String> {
    match segments {
        [share, ..] if *share == "share" => None,
        ["s", channel, ..] => is_handle(channel, &[]).then(|| format!("/{channel}")),
        [name, ..] => is_handle(name, &[]).then(|| format!("/{name}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum_order() {
        for (index, platform) in Platform::all().enumerate() {
            assert_eq!(platform.priority(), index);
            assert_eq!(platform.strategy().platform, platform);
        }
    }

    #[test]
    fn test_for_host_resolves_aliases_and_subdomains() {
        assert_eq!(Platform::for_host("x.com"), Some(Platform::Twitter));
        assert_eq!(Platform::for_host("mobile.twitter.com"), Some(Platform::Twitter));
        assert_eq!(Platform::for_host("fb.com"), Some(Platform::Facebook));
        assert_eq!(Platform::for_host("uk.linkedin.com"), Some(Platform::LinkedIn));
        assert_eq!(Platform::for_host("discord.gg"), Some(Platform::Discord));
        assert_eq!(Platform::for_host("acme.medium.com"), Some(Platform::Medium));
        assert_eq!(Platform::for_host("netflix.com"), None);
        assert_eq!(Platform::for_host("my-x.com"), None);
    }

    #[test]
    fn test_profile_regex_requires_slashes() {
        let regex = Platform::Twitter.profile_regex();
        assert!(regex.is_match("see https://x.com/acmeapp now"));
        assert!(regex.is_match(r#"href="//twitter.com/acmeapp""#));
        assert!(!regex.is_match("netflix.com/acmeapp"));
    }

    #[test]
    fn test_mentions_social_domain() {
        assert!(mentions_social_domain("https://WWW.Instagram.com/acme"));
        assert!(!mentions_social_domain("https://acme.io/contact"));
        assert!(mentions_social_domain("x.com/acme"));
        assert!(mentions_social_domain("follow @acme on t.me/acme"));
    }

    #[test]
    fn test_social_domain_needs_host_boundary() {
        assert!(!mentions_social_domain("https://netflix.com/title/1"));
        assert!(!mentions_social_domain("https://tiktok.com.evil.test/acme"));
        assert!(!mentions_social_domain("visit t.media.example today"));
        assert!(mentions_social_domain("https://m.facebook.com/acme"));
    }
}
