#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use linkmine::application::{AnalysisPipeline, Scheduler, UrlAnalyzer};
use linkmine::domain::{EventEmitter, PipelineEvent, WorkItem};
use linkmine::infrastructure::logging::{init_logging_with_config, log_system_info};
use linkmine::infrastructure::{AppConfig, ConfigManager, JsonListingSource, ResultExporter};

#[derive(Parser)]
#[command(name = "linkmine", version, about = "Resolve listing redirects and mine destination contacts")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and mine every work item in a JSON listing
    Analyze {
        /// JSON array of work items
        #[arg(long)]
        input: PathBuf,

        /// Export destination
        #[arg(long)]
        output: PathBuf,

        /// Write the full batch as JSON instead of CSV
        #[arg(long)]
        json: bool,

        /// Resolve only; skip contact extraction
        #[arg(long)]
        no_extract: bool,
    },
    /// Resolve a single URL and print the record as JSON
    Resolve { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let config = manager.load().context("Failed to load configuration")?;

    init_logging_with_config(&config.logging)?;
    log_system_info();

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupted, no further items will be admitted");
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Command::Analyze {
            input,
            output,
            json,
            no_extract,
        } => analyze(config, &input, &output, json, no_extract, token).await,
        Command::Resolve { url } => resolve(config, &url, token).await,
    }
}

fn report(event: &PipelineEvent) {
    match event {
        PipelineEvent::ScrapingProgress { count } => info!("📋 {} work items collected", count),
        PipelineEvent::AnalysisProgress { progress, message } => info!("📊 {}% {}", progress, message),
        PipelineEvent::ScrapingError { message } | PipelineEvent::AnalysisError { message } => {
            error!("❌ {}", message);
        }
        other => debug!("Event: {}", other.event_name()),
    }
}

async fn analyze(
    mut config: AppConfig,
    input: &Path,
    output: &Path,
    json: bool,
    no_extract: bool,
    token: CancellationToken,
) -> Result<()> {
    if no_extract {
        config.extractor.enabled = false;
    }

    let (emitter, mut events) = EventEmitter::channel();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            report(&event);
        }
    });

    let state = JsonListingSource::new(input)
        .collect(&emitter)
        .await
        .with_context(|| format!("Failed to collect work items from {}", input.display()))?;

    let analyzer = Arc::new(UrlAnalyzer::from_config(&config, token.clone())?);
    let pipeline = AnalysisPipeline::new(Scheduler::new(config.scheduler.clone()), analyzer, emitter)
        .with_cancellation(token);
    let batch = pipeline.run(state).await?;
    drop(pipeline);
    reporter.await.context("Event reporter failed")?;

    if json {
        ResultExporter::write_json(output, &batch).await?;
    } else {
        ResultExporter::write_csv(output, &batch.records).await?;
    }

    info!(
        "✅ Batch {} finished: {}/{} resolved",
        batch.batch_id, batch.stats.resolved, batch.stats.total
    );
    Ok(())
}

async fn resolve(config: AppConfig, url: &str, token: CancellationToken) -> Result<()> {
    let analyzer = Arc::new(UrlAnalyzer::from_config(&config, token.clone())?);
    let scheduler = Scheduler::new(config.scheduler);
    let records = scheduler
        .run(vec![WorkItem::new(url, url)], analyzer, &EventEmitter::disabled(), &token)
        .await;

    for record in &records {
        println!("{}", serde_json::to_string_pretty(record)?);
    }
    Ok(())
}
