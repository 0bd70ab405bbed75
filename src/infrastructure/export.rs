//! Result export
//!
//! CSV rows are always quoted, embedded quotes are backslash-escaped and rows
//! are joined with `\n` (no trailing newline). The header row is unquoted.

use std::path::Path;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;
use tracing::info;

use crate::domain::record::{BatchResult, OutputRecord};

pub const CSV_HEADER: [&str; 8] = [
    "Product Name",
    "Description",
    "Categories",
    "ProductHunt URL",
    "Comments",
    "Upvotes",
    "ProductHunt URLS",
    "Website URL",
];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Nothing to export")]
    Empty,
}

pub struct ResultExporter;

impl ResultExporter {
    /// Render records as CSV text
    pub fn to_csv(records: &[OutputRecord]) -> Result<String, ExportError> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .double_quote(false)
            .escape(b'\\')
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        for record in records {
            let item = &record.item;
            writer.write_record([
                item.name.as_str(),
                item.description.as_str(),
                item.categories.as_str(),
                item.source_listing_url.as_str(),
                item.comment_count.as_str(),
                item.vote_count.as_str(),
                record.outcome.original_url.as_str(),
                record.outcome.final_url.as_str(),
            ])?;
        }

        let body = writer
            .into_inner()
            .map_err(|error| ExportError::Io(error.into_error()))?;
        let body = String::from_utf8_lossy(&body);

        let mut csv = CSV_HEADER.join(",");
        let rows = body.trim_end_matches('\n');
        if !rows.is_empty() {
            csv.push('\n');
            csv.push_str(rows);
        }
        Ok(csv)
    }

    pub async fn write_csv(path: &Path, records: &[OutputRecord]) -> Result<(), ExportError> {
        if records.is_empty() {
            return Err(ExportError::Empty);
        }
        let csv = Self::to_csv(records)?;
        tokio::fs::write(path, csv).await?;
        info!("📄 Exported {} rows to {}", records.len(), path.display());
        Ok(())
    }

    /// Full batch (records, stats, timings) as pretty JSON
    pub async fn write_json(path: &Path, batch: &BatchResult) -> Result<(), ExportError> {
        let json = serde_json::to_vec_pretty(batch)?;
        tokio::fs::write(path, json).await?;
        info!(
            "📄 Exported batch {} ({} records) to {}",
            batch.batch_id,
            batch.records.len(),
            path.display()
        );
        Ok(())
    }
}
