//! Test utilities for linkmine
//!
//! Scripted doubles for the network seams (`PageFetcher`, `FetchProxy`) and
//! for the per-item analyzer, so resolver and scheduler tests run without a
//! network and under paused time.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::analyzer::ItemAnalyzer;
use crate::application::resolver::ResolveError;
use crate::domain::bundle::ExtractionBundle;
use crate::domain::outcome::ResolutionOutcome;
use crate::domain::work_item::WorkItem;
use crate::infrastructure::fetch_error::FetchError;
use crate::infrastructure::fetch_proxy::{FetchProxy, ProxyAction, ProxyRequest, ProxyResponse};
use crate::infrastructure::http_client::{FetchedPage, PageFetcher};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Default)]
struct FetcherScript {
    redirects: HashMap<String, Result<String, FetchError>>,
    referer_redirects: HashMap<(String, String), String>,
    pages: HashMap<String, Result<FetchedPage, FetchError>>,
    fallback: Option<FetchError>,
    requests: Vec<String>,
}

/// `PageFetcher` answering from a script.
///
/// Unscripted URLs resolve to themselves and fetch as HTTP 404, unless a
/// fallback error is set.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<FetcherScript>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(self, url: &str, final_url: &str) -> Self {
        lock(&self.script)
            .redirects
            .insert(url.to_string(), Ok(final_url.to_string()));
        self
    }

    /// Redirect taken only when the request carries `referer`
    pub fn redirect_with_referer(self, url: &str, referer: &str, final_url: &str) -> Self {
        lock(&self.script)
            .referer_redirects
            .insert((url.to_string(), referer.to_string()), final_url.to_string());
        self
    }

    /// Markup served at `url` after redirecting to `final_url`
    pub fn page(self, url: &str, final_url: &str, body: &str) -> Self {
        {
            let mut script = lock(&self.script);
            script
                .redirects
                .entry(url.to_string())
                .or_insert_with(|| Ok(final_url.to_string()));
            script.pages.insert(
                url.to_string(),
                Ok(FetchedPage {
                    final_url: final_url.to_string(),
                    body: body.to_string(),
                }),
            );
        }
        self
    }

    pub fn fail(self, url: &str, error: FetchError) -> Self {
        {
            let mut script = lock(&self.script);
            script.redirects.insert(url.to_string(), Err(error.clone()));
            script.pages.insert(url.to_string(), Err(error));
        }
        self
    }

    pub fn fallback(self, error: FetchError) -> Self {
        lock(&self.script).fallback = Some(error);
        self
    }

    /// Every requested URL, in order
    pub fn requests(&self) -> Vec<String> {
        lock(&self.script).requests.clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn resolve(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let mut script = lock(&self.script);
        script.requests.push(url.to_string());
        if let Some(referer) = referer {
            if let Some(final_url) = script
                .referer_redirects
                .get(&(url.to_string(), referer.to_string()))
            {
                return Ok(final_url.clone());
            }
        }
        if let Some(result) = script.redirects.get(url) {
            return result.clone();
        }
        match &script.fallback {
            Some(error) => Err(error.clone()),
            None => Ok(url.to_string()),
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut script = lock(&self.script);
        script.requests.push(url.to_string());
        if let Some(result) = script.pages.get(url) {
            return result.clone();
        }
        match &script.fallback {
            Some(error) => Err(error.clone()),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// `FetchProxy` answering from a script; unscripted requests fail
#[derive(Clone, Default)]
pub struct ScriptedProxy {
    resolves: Arc<Mutex<HashMap<String, String>>>,
    contents: Arc<Mutex<HashMap<String, (String, String)>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolves(self, url: &str, final_url: &str) -> Self {
        lock(&self.resolves).insert(url.to_string(), final_url.to_string());
        self
    }

    pub fn serves(self, url: &str, final_url: &str, content: &str) -> Self {
        lock(&self.contents).insert(url.to_string(), (final_url.to_string(), content.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchProxy for ScriptedProxy {
    async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request.action {
            ProxyAction::AnalyzeUrl => match lock(&self.resolves).get(&request.url) {
                Some(final_url) => ProxyResponse::resolved(final_url.clone()),
                None => ProxyResponse::failure(format!("no script for {}", request.url)),
            },
            ProxyAction::FetchContent => match lock(&self.contents).get(&request.url) {
                Some((final_url, content)) => ProxyResponse::content(final_url.clone(), content.clone()),
                None => ProxyResponse::failure(format!("no script for {}", request.url)),
            },
        }
    }
}

/// `ItemAnalyzer` with scripted latency and failures, keyed by source URL.
///
/// Successful items resolve to `https://dest.example/{name}`.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, usize>,
    hangs: HashSet<String>,
    panics: HashSet<String>,
    starts: Mutex<Vec<(String, Instant)>>,
    attempts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Latency for `source_url` only
    pub fn slow(mut self, source_url: &str, delay: Duration) -> Self {
        self.delays.insert(source_url.to_string(), delay);
        self
    }

    /// Fail the first `count` attempts for `source_url`
    pub fn failing(mut self, source_url: &str, count: usize) -> Self {
        self.failures.insert(source_url.to_string(), count);
        self
    }

    /// Never finish any attempt for `source_url`
    pub fn hanging(mut self, source_url: &str) -> Self {
        self.hangs.insert(source_url.to_string());
        self
    }

    pub fn panicking(mut self, source_url: &str) -> Self {
        self.panics.insert(source_url.to_string());
        self
    }

    /// `(source_url, start instant)` of every attempt, in start order
    pub fn starts(&self) -> Vec<(String, Instant)> {
        lock(&self.starts).clone()
    }

    pub fn attempts(&self, source_url: &str) -> usize {
        lock(&self.attempts).get(source_url).copied().unwrap_or_default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, item: &WorkItem) -> Result<(ResolutionOutcome, ExtractionBundle), ResolveError> {
        let url = item.source_url.clone();
        lock(&self.starts).push((url.clone(), Instant::now()));
        let attempt = {
            let mut attempts = lock(&self.attempts);
            let count = attempts.entry(url.clone()).or_default();
            *count += 1;
            *count
        };

        if self.panics.contains(&url) {
            panic!("scripted panic for {url}");
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if self.hangs.contains(&url) {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        }
        tokio::time::sleep(self.delays.get(&url).copied().unwrap_or(self.delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if attempt <= self.failures.get(&url).copied().unwrap_or_default() {
            return Err(ResolveError::Unreachable(format!("scripted failure {attempt}")));
        }

        let outcome = ResolutionOutcome::resolved(&url, &url, format!("https://dest.example/{}", item.name));
        Ok((outcome, ExtractionBundle::default()))
    }
}
