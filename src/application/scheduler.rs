//! Batch scheduler
//!
//! Admission is a start-time stagger: the k-th admitted item starts after
//! `admission_delay(k)` and nothing else bounds concurrency. Each attempt runs
//! as its own task raced against the per-item timeout. Results come back in
//! input order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::analyzer::ItemAnalyzer;
use crate::application::resolver::ResolveError;
use crate::application::retry::{RetryPolicy, retry_with_policy};
use crate::domain::bundle::ExtractionBundle;
use crate::domain::events::{EventEmitter, PipelineEvent};
use crate::domain::outcome::ResolutionOutcome;
use crate::domain::record::OutputRecord;
use crate::domain::work_item::WorkItem;
use crate::infrastructure::config::SchedulerConfig;

/// Start offset of the admitted item at `position`
pub fn admission_delay(position: usize, config: &SchedulerConfig) -> Duration {
    let ramp_up = config.ramp_up_count as u64;
    let position = position as u64;
    let millis = if position < ramp_up {
        position * config.ramp_up_delay_ms
    } else {
        ramp_up * config.ramp_up_delay_ms + (position - ramp_up) * config.steady_delay_ms
    };
    Duration::from_millis(millis)
}

pub struct Scheduler {
    config: SchedulerConfig,
    policy: RetryPolicy,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self { config, policy }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Analyze every item and return one record per item, in input order.
    ///
    /// Items without a usable source URL are recorded as skipped and never
    /// reach `analyzer`. Once `token` is cancelled, items still waiting for
    /// admission are recorded as `Error("cancelled")`.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        analyzer: Arc<dyn ItemAnalyzer>,
        emitter: &EventEmitter,
        token: &CancellationToken,
    ) -> Vec<OutputRecord> {
        let total = items.len();
        let progress_every = self.config.progress_every.max(1);
        info!(
            "🚀 Scheduling {} items (concurrency hint {}, timeout {}ms, {} retries)",
            total, self.config.max_concurrency_hint, self.config.per_item_timeout_ms, self.policy.max_retries
        );

        let mut admitted = 0usize;
        let tasks: Vec<_> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let position = item.usable_source_url().map(|_| {
                    admitted += 1;
                    admitted - 1
                });
                let analyzer = Arc::clone(&analyzer);
                async move {
                    let record = match position {
                        Some(position) => self.process(position, item, analyzer, token).await,
                        None => {
                            debug!("Skipping item without source URL: {}", item.name);
                            OutputRecord::skipped(item)
                        }
                    };
                    if index % progress_every == 0 {
                        emitter.emit(PipelineEvent::progress(index, total));
                    }
                    record
                }
            })
            .collect();

        let records = join_all(tasks).await;
        info!("🏁 Scheduled batch finished: {} records", records.len());
        records
    }

    async fn process(
        &self,
        position: usize,
        item: WorkItem,
        analyzer: Arc<dyn ItemAnalyzer>,
        token: &CancellationToken,
    ) -> OutputRecord {
        let delay = admission_delay(position, &self.config);
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("Admission cancelled for {}", item.source_url);
                let outcome = ResolutionOutcome::failed(&item.source_url, "cancelled");
                return OutputRecord::new(item, outcome, ExtractionBundle::default(), 0);
            }
            () = tokio::time::sleep(delay) => {}
        }

        let timeout = Duration::from_millis(self.config.per_item_timeout_ms);
        let (result, attempts) = retry_with_policy(&self.policy, |attempt| {
            let analyzer = Arc::clone(&analyzer);
            let task_item = item.clone();
            async move {
                debug!("Attempt {} for {}", attempt, task_item.source_url);
                // Dropping the handle on timeout detaches the task
                let handle = tokio::spawn(async move { analyzer.analyze(&task_item).await });
                match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => Err(ResolveError::Panicked(join_error.to_string())),
                    Err(_) => Err(ResolveError::Timeout),
                }
            }
        })
        .await;

        match result {
            Ok((outcome, bundle)) => OutputRecord::new(item, outcome, bundle, attempts),
            Err(error) => {
                warn!("❌ {} degraded after {} attempts: {}", item.source_url, attempts, error);
                let outcome = match error {
                    ResolveError::Timeout => ResolutionOutcome::timed_out(&item.source_url),
                    other => ResolutionOutcome::failed(&item.source_url, other.to_string()),
                };
                OutputRecord::new(item, outcome, ExtractionBundle::default(), attempts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 2000)]
    #[case(9, 18_000)]
    #[case(10, 20_000)]
    #[case(11, 20_500)]
    #[case(30, 30_000)]
    fn test_admission_delay(#[case] position: usize, #[case] expected_ms: u64) {
        assert_eq!(
            admission_delay(position, &SchedulerConfig::default()),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn test_admission_delay_without_ramp_up() {
        let config = SchedulerConfig {
            ramp_up_count: 0,
            steady_delay_ms: 100,
            ..SchedulerConfig::default()
        };
        assert_eq!(admission_delay(3, &config), Duration::from_millis(300));
    }
}
