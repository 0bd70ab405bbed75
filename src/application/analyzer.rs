//! Per-item analysis: resolve the redirect, then mine the destination

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::application::resolver::{ResolveError, Resolver};
use crate::domain::bundle::ExtractionBundle;
use crate::domain::outcome::ResolutionOutcome;
use crate::domain::work_item::WorkItem;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::extraction::ContactExtractor;
use crate::infrastructure::fetch_proxy::{FetchProxy, HttpFetchProxy};
use crate::infrastructure::http_client::{HttpClient, PageFetcher};

/// One attempt at one work item. Called by the scheduler, possibly several
/// times per item.
#[async_trait]
pub trait ItemAnalyzer: Send + Sync {
    async fn analyze(&self, item: &WorkItem) -> Result<(ResolutionOutcome, ExtractionBundle), ResolveError>;
}

pub struct UrlAnalyzer {
    resolver: Resolver,
    extractor: Option<ContactExtractor>,
}

impl UrlAnalyzer {
    pub fn new(resolver: Resolver, extractor: Option<ContactExtractor>) -> Self {
        Self { resolver, extractor }
    }

    /// Wire the direct client, the browser-header proxy and the extractor
    /// from configuration
    pub fn from_config(config: &AppConfig, token: CancellationToken) -> anyhow::Result<Self> {
        let fetcher: Arc<dyn PageFetcher> =
            Arc::new(HttpClient::new(config.http.clone())?.with_cancellation(token));
        let proxy: Option<Arc<dyn FetchProxy>> = if config.resolver.use_proxy_on_block {
            Some(Arc::new(HttpFetchProxy::new(&config.http)?))
        } else {
            None
        };
        let resolver = Resolver::new(fetcher, proxy, config.resolver.clone()).context("Failed to build resolver")?;
        let extractor = if config.extractor.enabled {
            Some(ContactExtractor::new(&config.extractor).context("Failed to build extractor")?)
        } else {
            None
        };
        Ok(Self::new(resolver, extractor))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Fetch the destination and run every extraction pass. A failed fetch
    /// leaves the bundle empty.
    async fn harvest(&self, extractor: &ContactExtractor, destination: &str, source_url: &str) -> ExtractionBundle {
        let page = match self.resolver.fetch_page(destination).await {
            Ok(page) => page,
            Err(error) => {
                warn!("Content fetch failed for {}: {}", destination, error);
                return ExtractionBundle::default();
            }
        };

        let source_domain = Url::parse(source_url)
            .ok()
            .and_then(|url| self.resolver.source_domain(&url));
        match extractor.extract(&page.final_url, &page.body, source_domain.as_deref()) {
            Ok(bundle) => {
                debug!("Harvested {} entries from {}", bundle.len(), page.final_url);
                bundle
            }
            Err(error) => {
                warn!("Extraction failed for {}: {}", page.final_url, error);
                ExtractionBundle::default()
            }
        }
    }
}

#[async_trait]
impl ItemAnalyzer for UrlAnalyzer {
    async fn analyze(&self, item: &WorkItem) -> Result<(ResolutionOutcome, ExtractionBundle), ResolveError> {
        let source_url = item.usable_source_url().unwrap_or(item.source_url.as_str());
        let outcome = self.resolver.resolve(source_url).await?;

        let bundle = match &self.extractor {
            Some(extractor) if outcome.is_resolved() => {
                self.harvest(extractor, &outcome.final_url, source_url).await
            }
            _ => ExtractionBundle::default(),
        };
        Ok((outcome, bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::{ExtractorConfig, ResolverConfig};
    use crate::test_utils::ScriptedFetcher;

    const SOURCE: &str = "https://service.example/r/p/7";

    fn analyzer(fetcher: ScriptedFetcher, extract: bool) -> UrlAnalyzer {
        let resolver = Resolver::new(Arc::new(fetcher), None, ResolverConfig::default()).unwrap();
        let extractor = extract.then(|| ContactExtractor::new(&ExtractorConfig::default()).unwrap());
        UrlAnalyzer::new(resolver, extractor)
    }

    #[tokio::test]
    async fn test_resolves_then_extracts() {
        let fetcher = ScriptedFetcher::new().redirect(SOURCE, "https://acme.io/").page(
            "https://acme.io/",
            "https://acme.io/",
            r#"<footer><a href="https://twitter.com/acmeapp">Twitter</a> <a href="mailto:team@acme.io">Mail</a> <a href="mailto:ops@service.example">Mail</a></footer>"#,
        );
        let (outcome, bundle) = analyzer(fetcher, true)
            .analyze(&WorkItem::new("Acme", SOURCE))
            .await
            .unwrap();
        assert_eq!(outcome.final_url, "https://acme.io/");
        assert_eq!(bundle.social_urls, vec!["https://twitter.com/acmeapp"]);
        assert_eq!(bundle.emails, vec!["team@acme.io"]);
    }

    #[tokio::test]
    async fn test_failed_content_fetch_keeps_outcome() {
        let fetcher = ScriptedFetcher::new().redirect(SOURCE, "https://acme.io/");
        let (outcome, bundle) = analyzer(fetcher, true)
            .analyze(&WorkItem::new("Acme", SOURCE))
            .await
            .unwrap();
        assert!(outcome.is_resolved());
        assert!(bundle.is_empty());
    }

    #[tokio::test]
    async fn test_extraction_disabled_skips_fetch() {
        let fetcher = ScriptedFetcher::new().redirect(SOURCE, "https://acme.io/");
        analyzer(fetcher.clone(), false)
            .analyze(&WorkItem::new("Acme", SOURCE))
            .await
            .unwrap();
        assert_eq!(fetcher.requests(), vec![SOURCE.to_string()]);
    }
}
