//! Redirect resolver
//!
//! Turns a listing redirect URL into the external destination it points at.
//! Strategies run in a fixed order and the first external hit wins:
//!
//! 1. validate the input
//! 2. follow redirects directly
//! 3. probe the item's redirect and item pages, then the original URL with a
//!    same-origin `Referer`
//! 4. recover the destination from the item page's markup
//!
//! When every strategy misses, a request that got any response yields a
//! still-origin outcome. A run where nothing ever answered is an error so the
//! scheduler can retry it.

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::domain::normalizer::{NOT_AVAILABLE, canonicalize_url};
use crate::domain::outcome::ResolutionOutcome;
use crate::domain::platform::{host_matches, strip_host_prefix};
use crate::infrastructure::config::{ConfigError, ResolverConfig};
use crate::infrastructure::extraction::DestinationFinder;
use crate::infrastructure::fetch_error::FetchError;
use crate::infrastructure::fetch_proxy::{FetchProxy, proxy_fetch, proxy_resolve};
use crate::infrastructure::http_client::{FetchedPage, PageFetcher};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Timed out")]
    Timeout,

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Attempt panicked: {0}")]
    Panicked(String),
}

/// What the strategies observed so far
#[derive(Debug, Default)]
struct Trail {
    responded: bool,
    transport_failures: usize,
    timeouts: usize,
    last_error: Option<FetchError>,
    last_same_origin: Option<String>,
}

impl Trail {
    fn record_error(&mut self, error: FetchError) {
        if error.is_transport() {
            self.transport_failures += 1;
            if error.is_timeout() {
                self.timeouts += 1;
            }
        } else if matches!(error, FetchError::Blocked { .. } | FetchError::Status { .. }) {
            self.responded = true;
        }
        self.last_error = Some(error);
    }

    fn exhausted(self) -> ResolveError {
        if self.transport_failures > 0 && self.timeouts == self.transport_failures {
            return ResolveError::Timeout;
        }
        let message = self
            .last_error
            .map_or_else(|| "no response".to_string(), |error| error.to_string());
        ResolveError::Unreachable(message)
    }
}

pub struct Resolver {
    fetcher: Arc<dyn PageFetcher>,
    proxy: Option<Arc<dyn FetchProxy>>,
    config: ResolverConfig,
    item_id: Regex,
    finder: DestinationFinder,
}

impl Resolver {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        proxy: Option<Arc<dyn FetchProxy>>,
        config: ResolverConfig,
    ) -> Result<Self, ConfigError> {
        let item_id = Regex::new(&config.item_id_pattern).map_err(|e| ConfigError::Validation {
            message: format!("resolver.item_id_pattern: {e}"),
        })?;
        let finder = DestinationFinder::new(&config.non_destination_domains).map_err(|e| {
            ConfigError::Validation {
                message: format!("resolver.non_destination_domains: {e}"),
            }
        })?;
        Ok(Self {
            fetcher,
            proxy,
            config,
            item_id,
            finder,
        })
    }

    /// Domain whose URLs count as "not resolved yet" for `input`
    pub fn source_domain(&self, input: &Url) -> Option<String> {
        match &self.config.source_domain {
            Some(domain) => Some(strip_host_prefix(domain)),
            None => input.host_str().map(strip_host_prefix),
        }
    }

    fn is_external(candidate: &str, source_domain: &str) -> bool {
        Url::parse(candidate).ok().is_some_and(|url| {
            matches!(url.scheme(), "http" | "https")
                && url
                    .host_str()
                    .is_some_and(|host| !host_matches(&strip_host_prefix(host), source_domain))
        })
    }

    fn proxy(&self) -> Option<&dyn FetchProxy> {
        if self.config.use_proxy_on_block {
            self.proxy.as_deref()
        } else {
            None
        }
    }

    /// GET `url` for its markup, going through the proxy when the direct
    /// request is blocked
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        match self.fetcher.fetch_text(url).await {
            Err(error) if error.is_blocked() => match self.proxy() {
                Some(proxy) => {
                    debug!("Direct fetch blocked, using proxy: {}", url);
                    let (final_url, body) = proxy_fetch(proxy, url).await?;
                    Ok(FetchedPage { final_url, body })
                }
                None => Err(error),
            },
            other => other,
        }
    }

    /// Follow redirects, handing blocked requests to the proxy. A blocked
    /// response that already left the source domain is returned as is, and a
    /// failed proxy attempt yields the original blocked error.
    async fn follow_redirects(&self, url: &str, referer: Option<&str>, source_domain: &str) -> Result<String, FetchError> {
        match self.fetcher.resolve(url, referer).await {
            Err(error) if error.is_blocked() => {
                let Some(proxy) = self.proxy() else {
                    return Err(error);
                };
                if error
                    .observed_url()
                    .is_some_and(|observed| Self::is_external(observed, source_domain))
                {
                    return Err(error);
                }
                debug!("Redirect follow blocked, using proxy: {}", url);
                proxy_resolve(proxy, url).await.map_err(|proxy_error| {
                    debug!("Proxy resolve failed for {}: {}", url, proxy_error);
                    error
                })
            }
            other => other,
        }
    }

    /// One redirect-following strategy; returns the external URL it reached
    async fn follow(&self, url: &str, referer: Option<&str>, source_domain: &str, trail: &mut Trail) -> Option<String> {
        match self.follow_redirects(url, referer, source_domain).await {
            Ok(final_url) => {
                trail.responded = true;
                if Self::is_external(&final_url, source_domain) {
                    return Some(final_url);
                }
                debug!("Still on {}: {}", source_domain, final_url);
                trail.last_same_origin = Some(final_url);
                None
            }
            Err(error) => {
                debug!("Follow failed for {}: {}", url, error);
                // A blocked response can still have left the source domain
                let observed = error.observed_url().map(str::to_string);
                trail.record_error(error);
                observed.filter(|observed| Self::is_external(observed, source_domain))
            }
        }
    }

    async fn recover_from_content(&self, page_url: &str, source_domain: &str, trail: &mut Trail) -> Option<String> {
        match self.fetch_page(page_url).await {
            Ok(page) => {
                trail.responded = true;
                if Self::is_external(&page.final_url, source_domain) {
                    return Some(page.final_url);
                }
                let base = Url::parse(&page.final_url).ok()?;
                self.finder.find(&page.body, &base, source_domain)
            }
            Err(error) => {
                debug!("Content fetch failed for {}: {}", page_url, error);
                trail.record_error(error);
                None
            }
        }
    }

    pub async fn resolve(&self, original_url: &str) -> Result<ResolutionOutcome, ResolveError> {
        let input = original_url.trim();
        if input.is_empty() || input.eq_ignore_ascii_case(NOT_AVAILABLE) {
            return Ok(ResolutionOutcome::skipped(original_url));
        }

        let Some((url, source_domain)) = Url::parse(input)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .and_then(|url| {
                let domain = self.source_domain(&url)?;
                Some((url, domain))
            })
        else {
            debug!("Invalid source URL: {}", original_url);
            return Ok(ResolutionOutcome::invalid(original_url));
        };

        let cleaned = canonicalize_url(input);
        let resolved = |final_url: String| -> Result<ResolutionOutcome, ResolveError> {
            let outcome = ResolutionOutcome::resolved(original_url, &cleaned, canonicalize_url(&final_url));
            info!("✅ {} -> {}", original_url, outcome.final_url);
            Ok(outcome)
        };
        let mut trail = Trail::default();

        debug!("Following redirects for {}", input);
        if let Some(found) = self.follow(input, None, &source_domain, &mut trail).await {
            return resolved(found);
        }

        let origin = url.origin().ascii_serialization();
        let item_id = self
            .item_id
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|id| id.as_str().to_string());

        if let Some(id) = &item_id {
            for probe in [format!("{origin}/posts/{id}/redirect"), format!("{origin}/posts/{id}")] {
                debug!("Probing {}", probe);
                if let Some(found) = self.follow(&probe, None, &source_domain, &mut trail).await {
                    return resolved(found);
                }
            }
        }

        let referer = format!("{origin}/");
        debug!("Retrying {} with referer {}", input, referer);
        if let Some(found) = self.follow(input, Some(&referer), &source_domain, &mut trail).await {
            return resolved(found);
        }

        let item_page = item_id
            .map(|id| format!("{origin}/posts/{id}"))
            .or_else(|| trail.last_same_origin.clone());
        if let Some(page_url) = item_page {
            debug!("Recovering destination from {}", page_url);
            if let Some(found) = self.recover_from_content(&page_url, &source_domain, &mut trail).await {
                return resolved(found);
            }
        }

        if trail.responded {
            info!("⚠️ {} never left {}", original_url, source_domain);
            Ok(ResolutionOutcome::still_origin(original_url, &cleaned))
        } else {
            Err(trail.exhausted())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::{ExtractionStatus, RedirectStatus};
    use crate::test_utils::{ScriptedFetcher, ScriptedProxy};

    const SOURCE: &str = "https://www.service.example/r/p/42?app_id=339";

    fn resolver(fetcher: ScriptedFetcher, proxy: Option<ScriptedProxy>) -> Resolver {
        let proxy = proxy.map(|proxy| Arc::new(proxy) as Arc<dyn FetchProxy>);
        Resolver::new(Arc::new(fetcher), proxy, ResolverConfig::default()).unwrap()
    }

    fn timeout(url: &str) -> FetchError {
        FetchError::Timeout { url: url.to_string() }
    }

    #[tokio::test]
    async fn test_invalid_and_missing_input() {
        let resolver = resolver(ScriptedFetcher::new(), None);

        let outcome = resolver.resolve("not a url").await.unwrap();
        assert_eq!(outcome.redirect_status, RedirectStatus::Invalid);
        assert_eq!(outcome.final_url, "N/A");

        let outcome = resolver.resolve("ftp://files.example/x").await.unwrap();
        assert_eq!(outcome.redirect_status, RedirectStatus::Invalid);

        let outcome = resolver.resolve("N/A").await.unwrap();
        assert_eq!(outcome.extraction_status, ExtractionStatus::Skipped);
    }

    #[tokio::test]
    async fn test_direct_redirect_is_canonicalized() {
        let fetcher = ScriptedFetcher::new().redirect(SOURCE, "https://acme.io/?ref=service");
        let outcome = resolver(fetcher, None).resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.final_url, "https://acme.io/");
        assert_eq!(outcome.redirect_status, RedirectStatus::Redirected);
        assert_eq!(outcome.extraction_status, ExtractionStatus::Success);
    }

    #[tokio::test]
    async fn test_external_input_is_no_redirect() {
        let fetcher = ScriptedFetcher::new().redirect("https://acme.io/", "https://acme.io/");
        let config = ResolverConfig {
            source_domain: Some("service.example".into()),
            ..ResolverConfig::default()
        };
        let resolver = Resolver::new(Arc::new(fetcher), None, config).unwrap();
        let outcome = resolver.resolve("https://acme.io/").await.unwrap();
        assert_eq!(outcome.redirect_status, RedirectStatus::NoRedirect);
    }

    #[tokio::test]
    async fn test_probe_redirect_page_after_direct_miss() {
        let fetcher = ScriptedFetcher::new()
            .redirect(SOURCE, "https://www.service.example/posts/acme")
            .redirect("https://www.service.example/posts/42/redirect", "https://acme.io/");
        let resolver = resolver(fetcher.clone(), None);
        let outcome = resolver.resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.final_url, "https://acme.io/");
        assert_eq!(
            fetcher.requests(),
            vec![SOURCE.to_string(), "https://www.service.example/posts/42/redirect".to_string()]
        );
    }

    #[tokio::test]
    async fn test_referer_probe_is_sent() {
        let fetcher = ScriptedFetcher::new()
            .redirect(SOURCE, "https://www.service.example/")
            .redirect_with_referer(SOURCE, "https://www.service.example/", "https://acme.io/");
        let outcome = resolver(fetcher, None).resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.final_url, "https://acme.io/");
    }

    #[tokio::test]
    async fn test_content_recovery_reads_item_page() {
        let fetcher = ScriptedFetcher::new()
            .redirect(SOURCE, "https://www.service.example/posts/acme")
            .page(
                "https://www.service.example/posts/42",
                "https://www.service.example/posts/acme",
                r#"<a href="https://twitter.com/service">Follow</a><a href="https://acme.io/?utm_source=service" class="external-link">Acme</a>"#,
            );
        let outcome = resolver(fetcher, None).resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.final_url, "https://acme.io/");
        assert_eq!(outcome.redirect_status, RedirectStatus::Redirected);
    }

    #[tokio::test]
    async fn test_still_origin_when_nothing_leaves_source() {
        let fetcher = ScriptedFetcher::new().redirect(SOURCE, "https://www.service.example/");
        let outcome = resolver(fetcher, None).resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.redirect_status, RedirectStatus::StillOrigin);
        assert_eq!(outcome.extraction_status, ExtractionStatus::Partial);
        assert_eq!(outcome.final_url, "https://www.service.example/r/p/42?app_id=339");
    }

    #[tokio::test]
    async fn test_transport_failures_are_errors() {
        let fetcher = ScriptedFetcher::new().fallback(timeout("*"));
        let error = resolver(fetcher, None).resolve(SOURCE).await.unwrap_err();
        assert_eq!(error, ResolveError::Timeout);

        let fetcher = ScriptedFetcher::new().fallback(FetchError::Network {
            url: "*".into(),
            message: "connection refused".into(),
        });
        let error = resolver(fetcher, None).resolve(SOURCE).await.unwrap_err();
        assert!(matches!(error, ResolveError::Unreachable(message) if message.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_blocked_request_goes_through_proxy() {
        let fetcher = ScriptedFetcher::new().fail(
            SOURCE,
            FetchError::Blocked {
                url: SOURCE.into(),
                status: 403,
                final_url: None,
            },
        );
        let proxy = ScriptedProxy::new().resolves(SOURCE, "https://acme.io/");
        let outcome = resolver(fetcher, Some(proxy.clone())).resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.final_url, "https://acme.io/");
        assert_eq!(proxy.calls(), 1);
    }

    #[tokio::test]
    async fn test_blocked_destination_still_counts() {
        let fetcher = ScriptedFetcher::new().fail(
            SOURCE,
            FetchError::Blocked {
                url: SOURCE.into(),
                status: 403,
                final_url: Some("https://acme.io/".into()),
            },
        );
        let config = ResolverConfig {
            use_proxy_on_block: false,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::new(Arc::new(fetcher), None, config).unwrap();
        assert_eq!(resolver.resolve(SOURCE).await.unwrap().final_url, "https://acme.io/");
    }

    #[tokio::test]
    async fn test_blocked_destination_survives_failing_proxy() {
        let fetcher = ScriptedFetcher::new().fail(
            SOURCE,
            FetchError::Blocked {
                url: SOURCE.into(),
                status: 403,
                final_url: Some("https://acme.io/welcome".into()),
            },
        );
        let proxy = ScriptedProxy::new();
        let outcome = resolver(fetcher, Some(proxy.clone())).resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.final_url, "https://acme.io/welcome");
        assert_eq!(outcome.redirect_status, RedirectStatus::Redirected);
        assert_eq!(proxy.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_proxy_keeps_blocked_response() {
        let blocked = |url: &str| FetchError::Blocked {
            url: url.into(),
            status: 403,
            final_url: None,
        };
        let fetcher = ScriptedFetcher::new()
            .fail(SOURCE, blocked(SOURCE))
            .fallback(blocked("https://www.service.example/"));
        let proxy = ScriptedProxy::new();
        let outcome = resolver(fetcher, Some(proxy.clone())).resolve(SOURCE).await.unwrap();
        assert_eq!(outcome.redirect_status, RedirectStatus::StillOrigin);
        assert!(proxy.calls() >= 1);
    }
}
