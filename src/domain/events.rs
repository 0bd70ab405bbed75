//! Pipeline events
//!
//! Wire contract between the pipeline and whatever renders progress. Each
//! event serializes as a JSON object tagged by `action`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::domain::record::OutputRecord;
use crate::domain::work_item::WorkItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PipelineEvent {
    ScrapingStarted,
    ScrapingProgress { count: usize },
    UrlsCollected { count: usize, data: Vec<WorkItem> },
    AnalysisStarted,
    AnalysisProgress { progress: u8, message: String },
    AnalysisComplete { count: usize, data: Vec<OutputRecord> },
    ScrapingError { message: String },
    AnalysisError { message: String },
}

impl PipelineEvent {
    /// The `action` tag of this event
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ScrapingStarted => "scraping_started",
            Self::ScrapingProgress { .. } => "scraping_progress",
            Self::UrlsCollected { .. } => "urls_collected",
            Self::AnalysisStarted => "analysis_started",
            Self::AnalysisProgress { .. } => "analysis_progress",
            Self::AnalysisComplete { .. } => "analysis_complete",
            Self::ScrapingError { .. } => "scraping_error",
            Self::AnalysisError { .. } => "analysis_error",
        }
    }

    /// Progress update after item `index` of `total` completed
    pub fn progress(index: usize, total: usize) -> Self {
        let done = index + 1;
        let percent = if total == 0 {
            100.0
        } else {
            (done as f64 / total as f64 * 100.0).round()
        };
        Self::AnalysisProgress {
            progress: percent.clamp(0.0, 100.0) as u8,
            message: format!("Processing {done}/{total}"),
        }
    }
}

/// Sends pipeline events to a single consumer. Cloning shares the channel.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    sender: Option<UnboundedSender<PipelineEvent>>,
}

impl EventEmitter {
    pub fn channel() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender: Some(sender) }, receiver)
    }

    /// Emitter that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: PipelineEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        let name = event.event_name();
        if sender.send(event).is_err() {
            debug!("Event receiver dropped; discarding {}", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_tagged_by_action() {
        let json = serde_json::to_value(PipelineEvent::progress(0, 3)).unwrap();
        assert_eq!(json["action"], "analysis_progress");
        assert_eq!(json["progress"], 33);
        assert_eq!(json["message"], "Processing 1/3");

        let json = serde_json::to_value(PipelineEvent::AnalysisStarted).unwrap();
        assert_eq!(json, serde_json::json!({ "action": "analysis_started" }));
    }

    #[tokio::test]
    async fn test_emitter_delivers_in_order() {
        let (emitter, mut receiver) = EventEmitter::channel();
        emitter.emit(PipelineEvent::AnalysisStarted);
        emitter.clone().emit(PipelineEvent::progress(9, 10));
        drop(emitter);

        assert_eq!(receiver.recv().await, Some(PipelineEvent::AnalysisStarted));
        assert_eq!(receiver.recv().await, Some(PipelineEvent::progress(9, 10)));
        assert_eq!(receiver.recv().await, None);

        EventEmitter::disabled().emit(PipelineEvent::AnalysisStarted);
    }

    #[test]
    fn test_event_name_matches_tag() {
        let event = PipelineEvent::AnalysisError {
            message: "No products collected for analysis".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], event.event_name());
    }
}
