//! Per-item output records and batch aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::bundle::ExtractionBundle;
use crate::domain::outcome::{ExtractionStatus, RedirectStatus, ResolutionOutcome};
use crate::domain::work_item::WorkItem;

/// One exported row: listing metadata, resolution and harvest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    #[serde(flatten)]
    pub item: WorkItem,
    #[serde(flatten)]
    pub outcome: ResolutionOutcome,
    pub extraction: ExtractionBundle,
    /// Resolver attempts consumed; zero for skipped items
    pub attempts: u32,
}

impl OutputRecord {
    pub fn new(item: WorkItem, outcome: ResolutionOutcome, extraction: ExtractionBundle, attempts: u32) -> Self {
        Self {
            item,
            outcome,
            extraction,
            attempts,
        }
    }

    pub fn skipped(item: WorkItem) -> Self {
        let outcome = ResolutionOutcome::skipped(&item.source_url);
        Self::new(item, outcome, ExtractionBundle::default(), 0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total: usize,
    pub resolved: usize,
    pub partial: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Records that needed more than one attempt
    pub retried: usize,
}

impl BatchStats {
    pub fn from_records(records: &[OutputRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match (&record.outcome.redirect_status, record.outcome.extraction_status) {
                (_, ExtractionStatus::Success) => stats.resolved += 1,
                (_, ExtractionStatus::Partial) => stats.partial += 1,
                (_, ExtractionStatus::Skipped) => stats.skipped += 1,
                (RedirectStatus::Invalid, _) => stats.invalid += 1,
                (RedirectStatus::TimedOut, _) => stats.timed_out += 1,
                _ => stats.failed += 1,
            }
            if record.attempts > 1 {
                stats.retried += 1;
            }
        }
        stats
    }
}

/// Result of one batch run; `records` is in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<OutputRecord>,
    pub stats: BatchStats,
}

impl BatchResult {
    pub fn new(started_at: DateTime<Utc>, records: Vec<OutputRecord>) -> Self {
        let stats = BatchStats::from_records(&records);
        Self {
            batch_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            records,
            stats,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: ResolutionOutcome, attempts: u32) -> OutputRecord {
        OutputRecord::new(WorkItem::new("x", "https://s.test/r/p/1"), outcome, ExtractionBundle::default(), attempts)
    }

    #[test]
    fn test_stats_count_every_category() {
        let records = vec![
            record(ResolutionOutcome::resolved("u", "u", "https://acme.io/".into()), 1),
            record(ResolutionOutcome::still_origin("u", "u"), 2),
            OutputRecord::skipped(WorkItem::new("y", "N/A")),
            record(ResolutionOutcome::invalid("nope"), 1),
            record(ResolutionOutcome::timed_out("u"), 3),
            record(ResolutionOutcome::failed("u", "refused"), 3),
        ];
        let stats = BatchStats::from_records(&records);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.partial, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 3);
    }

    #[test]
    fn test_record_json_is_flat() {
        let value = serde_json::to_value(OutputRecord::skipped(WorkItem::new("Acme", "N/A"))).unwrap();
        assert_eq!(value["Product Name"], "Acme");
        assert_eq!(value["finalUrl"], "N/A");
        assert_eq!(value["extractionStatus"], "skipped");
        assert_eq!(value["attempts"], 0);
    }
}
