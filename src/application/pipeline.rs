//! Analysis pipeline
//!
//! Takes the collected pipeline state, runs the scheduler over it and reports
//! the batch lifecycle on the event channel.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::application::analyzer::ItemAnalyzer;
use crate::application::scheduler::Scheduler;
use crate::domain::events::{EventEmitter, PipelineEvent};
use crate::domain::record::BatchResult;
use crate::domain::work_item::PipelineState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No products collected for analysis")]
    NoWorkItems,
}

pub struct AnalysisPipeline {
    scheduler: Scheduler,
    analyzer: Arc<dyn ItemAnalyzer>,
    emitter: EventEmitter,
    cancellation_token: CancellationToken,
}

impl AnalysisPipeline {
    pub fn new(scheduler: Scheduler, analyzer: Arc<dyn ItemAnalyzer>, emitter: EventEmitter) -> Self {
        Self {
            scheduler,
            analyzer,
            emitter,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn run(&self, state: PipelineState) -> Result<BatchResult, PipelineError> {
        if state.is_empty() {
            error!("❌ {}", PipelineError::NoWorkItems);
            self.emitter.emit(PipelineEvent::AnalysisError {
                message: PipelineError::NoWorkItems.to_string(),
            });
            return Err(PipelineError::NoWorkItems);
        }

        info!("🔍 Starting analysis of {} items", state.len());
        self.emitter.emit(PipelineEvent::AnalysisStarted);
        let started_at = Utc::now();

        let records = self
            .scheduler
            .run(
                state.items,
                Arc::clone(&self.analyzer),
                &self.emitter,
                &self.cancellation_token,
            )
            .await;

        self.emitter.emit(PipelineEvent::AnalysisComplete {
            count: records.len(),
            data: records.clone(),
        });

        let batch = BatchResult::new(started_at, records);
        let stats = &batch.stats;
        info!(
            "✅ Analysis complete in {}ms: {} resolved, {} partial, {} skipped, {} invalid, {} timed out, {} failed ({} retried)",
            batch.duration_ms(),
            stats.resolved,
            stats.partial,
            stats.skipped,
            stats.invalid,
            stats.timed_out,
            stats.failed,
            stats.retried
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::work_item::WorkItem;
    use crate::infrastructure::config::SchedulerConfig;
    use crate::test_utils::ScriptedAnalyzer;

    fn pipeline(emitter: EventEmitter) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Scheduler::new(SchedulerConfig::default()),
            Arc::new(ScriptedAnalyzer::new()),
            emitter,
        )
    }

    #[tokio::test]
    async fn test_empty_state_is_an_error() {
        let (emitter, mut events) = EventEmitter::channel();
        let result = pipeline(emitter).run(PipelineState::default()).await;
        assert_eq!(result.unwrap_err(), PipelineError::NoWorkItems);
        assert_eq!(
            events.recv().await,
            Some(PipelineEvent::AnalysisError {
                message: "No products collected for analysis".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_events_bracket_progress() {
        let (emitter, mut events) = EventEmitter::channel();
        let state = PipelineState::new(vec![
            WorkItem::new("a", "https://service.example/r/p/1"),
            WorkItem::new("b", "N/A"),
        ]);
        let batch = pipeline(emitter.clone()).run(state).await.unwrap();
        drop(emitter);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.stats.resolved, 1);
        assert_eq!(batch.stats.skipped, 1);

        let mut names = Vec::new();
        while let Some(event) = events.recv().await {
            names.push(event.event_name());
        }
        assert_eq!(
            names,
            vec!["analysis_started", "analysis_progress", "analysis_complete"]
        );
    }
}
