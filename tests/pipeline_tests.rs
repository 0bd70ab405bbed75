//! End-to-end batch runs against scripted network doubles
use std::sync::Arc;

use linkmine::application::{AnalysisPipeline, ItemAnalyzer, Resolver, Scheduler, UrlAnalyzer};
use linkmine::domain::{EventEmitter, ExtractionStatus, PipelineEvent, PipelineState, RedirectStatus};
use linkmine::infrastructure::config::{ExtractorConfig, ResolverConfig, SchedulerConfig};
use linkmine::infrastructure::listing::parse_work_items;
use linkmine::infrastructure::{ContactExtractor, FetchError, FetchProxy, ResultExporter};
use linkmine::test_utils::{ScriptedFetcher, ScriptedProxy};

const LISTING: &str = r#"[
  {"Product Name": "Acme", "Description": "Rocket \"fuel\" for teams", "Categories": "Dev Tools",
   "ProductHunt URL": "https://www.service.example/posts/acme", "Comments": "12", "Upvotes": "340",
   "Product Id Url": "https://www.service.example/r/p/42?app_id=339"},
  {"Product Name": "Ghost", "Product Id Url": "N/A"},
  {"Product Name": "Beta", "Product Id Url": "https://www.service.example/r/p/77"},
  {"Product Name": "Broken", "Product Id Url": "not a url"}
]"#;

const ACME_HOME: &str = r#"<html><head>
  <script type="application/ld+json">{"@type":"Organization","sameAs":["https://x.com/acmeapp/status/1"]}</script>
</head><body>
  <a href="/signup">Sign up free</a>
  <footer class="site-footer">
    <a href="https://github.com/acme/rockets">GitHub</a>
    <a href="mailto:Hello@Acme.io?subject=hi">Email us</a>
    <p>Press: press@acme.io or noreply@acme.io</p>
  </footer>
</body></html>"#;

const BETA_ITEM_PAGE: &str = r#"<html><body>
  <script>window.__DATA__ = {"post": {"website_url": "https:\/\/beta.dev\/?ref=service"}};</script>
  <a href="https://twitter.com/service">Follow us</a>
</body></html>"#;

fn fetcher() -> ScriptedFetcher {
    ScriptedFetcher::new()
        // Direct follow is refused; the proxy resolves it
        .fail(
            "https://www.service.example/r/p/42?app_id=339",
            FetchError::Blocked {
                url: "https://www.service.example/r/p/42?app_id=339".into(),
                status: 403,
                final_url: None,
            },
        )
        .page("https://acme.io/", "https://acme.io/", ACME_HOME)
        // Beta never leaves the source; its item page names the destination
        .redirect("https://www.service.example/r/p/77", "https://www.service.example/posts/beta")
        .page(
            "https://www.service.example/posts/77",
            "https://www.service.example/posts/beta",
            BETA_ITEM_PAGE,
        )
}

fn analyzer(fetcher: ScriptedFetcher, proxy: ScriptedProxy) -> Arc<dyn ItemAnalyzer> {
    let proxy: Arc<dyn FetchProxy> = Arc::new(proxy);
    let resolver = Resolver::new(Arc::new(fetcher), Some(proxy), ResolverConfig::default()).unwrap();
    let extractor = ContactExtractor::new(&ExtractorConfig::default()).unwrap();
    Arc::new(UrlAnalyzer::new(resolver, Some(extractor)))
}

fn scheduler() -> Scheduler {
    Scheduler::new(SchedulerConfig {
        ramp_up_delay_ms: 10,
        steady_delay_ms: 10,
        backoff_base_ms: 10,
        ..SchedulerConfig::default()
    })
}

#[tokio::test(start_paused = true)]
async fn batch_resolves_extracts_and_exports() {
    let proxy = ScriptedProxy::new().resolves(
        "https://www.service.example/r/p/42?app_id=339",
        "https://acme.io/?utm_source=service",
    );
    let (emitter, mut events) = EventEmitter::channel();
    let pipeline = AnalysisPipeline::new(scheduler(), analyzer(fetcher(), proxy.clone()), emitter);

    let state = PipelineState::new(parse_work_items(LISTING).unwrap());
    let batch = pipeline.run(state).await.unwrap();
    drop(pipeline);

    assert_eq!(batch.records.len(), 4);
    assert_eq!(batch.stats.resolved, 2);
    assert_eq!(batch.stats.skipped, 1);
    assert_eq!(batch.stats.invalid, 1);
    assert!(proxy.calls() >= 1);

    let acme = &batch.records[0];
    assert_eq!(acme.outcome.final_url, "https://acme.io/");
    assert_eq!(acme.outcome.redirect_status, RedirectStatus::Redirected);
    assert_eq!(
        acme.extraction.social_urls,
        vec!["https://twitter.com/acmeapp", "https://github.com/acme"]
    );
    assert_eq!(acme.extraction.emails, vec!["hello@acme.io", "press@acme.io"]);
    assert_eq!(acme.extraction.signup_urls, vec!["https://acme.io/signup"]);

    assert_eq!(batch.records[1].outcome.extraction_status, ExtractionStatus::Skipped);
    assert_eq!(batch.records[2].outcome.final_url, "https://beta.dev/");
    assert_eq!(batch.records[3].outcome.redirect_status, RedirectStatus::Invalid);

    let csv = ResultExporter::to_csv(&batch.records).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[1],
        r#""Acme","Rocket \"fuel\" for teams","Dev Tools","https://www.service.example/posts/acme","12","340","https://www.service.example/r/p/42?app_id=339","https://acme.io/""#
    );
    assert!(lines[2].ends_with(r#""N/A","N/A""#));

    let mut names = Vec::new();
    while let Some(event) = events.recv().await {
        names.push(event.event_name());
    }
    assert_eq!(names.first(), Some(&"analysis_started"));
    assert_eq!(names.last(), Some(&"analysis_complete"));
}

#[tokio::test(start_paused = true)]
async fn unreachable_items_degrade_without_failing_the_batch() {
    let fetcher = ScriptedFetcher::new().fallback(FetchError::Network {
        url: "*".into(),
        message: "connection refused".into(),
    });
    let (emitter, mut events) = EventEmitter::channel();
    let pipeline = AnalysisPipeline::new(scheduler(), analyzer(fetcher, ScriptedProxy::new()), emitter);

    let state = PipelineState::new(parse_work_items(LISTING).unwrap());
    let batch = pipeline.run(state).await.unwrap();
    drop(pipeline);

    assert_eq!(batch.records.len(), 4);
    assert_eq!(batch.stats.failed, 2);
    assert_eq!(batch.stats.retried, 2);
    assert!(matches!(
        &batch.records[0].outcome.redirect_status,
        RedirectStatus::Error(message) if message.contains("connection refused")
    ));

    let complete = std::iter::from_fn(|| events.try_recv().ok())
        .find_map(|event| match event {
            PipelineEvent::AnalysisComplete { count, .. } => Some(count),
            _ => None,
        });
    assert_eq!(complete, Some(4));
}
