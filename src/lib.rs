pub mod aggregator;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod scraping;
pub mod telegram;
mod utils;

use std::path::PathBuf;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::info;

use aggregator::{Aggregation, RunHealth};
use config::AppConfig;
use error::RunError;
use export::{ChatExporter, Report};
use scraping::{SourceKind, SourceRegistry, VenueScraper};
use telegram::TelegramPoster;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write files only; never contact Telegram.
    pub local_only: bool,
    pub only_source: Option<String>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub aggregation: Aggregation,
    pub health: RunHealth,
    pub message: String,
    pub written: Vec<PathBuf>,
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceListing {
    pub name: String,
    pub kind: SourceKind,
    pub enabled: bool,
    pub max_events: Option<usize>,
    pub display_name: String,
    pub url: String,
}

fn registry_for(config: &AppConfig) -> Result<SourceRegistry, RunError> {
    let mut registry = SourceRegistry::builtin()?;
    registry.register_configured(config)?;
    Ok(registry)
}

/// Every known source with its effective settings.
pub fn list_sources(config: &AppConfig) -> Result<Vec<SourceListing>, RunError> {
    let registry = registry_for(config)?;
    let mut listings = Vec::new();
    for (name, factory) in registry.get_all() {
        let settings = config.source(name);
        let descriptor = factory.descriptor(name, settings);
        let scraper = factory.build(name, settings)?;
        listings.push(SourceListing {
            name: descriptor.name,
            kind: descriptor.kind,
            enabled: descriptor.enabled,
            max_events: descriptor.max_events,
            display_name: scraper.display_name().to_string(),
            url: scraper.venue_url().to_string(),
        });
    }
    Ok(listings)
}

/// One full run: validate, fetch, bucket, write every export, then deliver.
/// Files are written before delivery so a failed post still leaves output.
pub async fn run(
    config: &AppConfig,
    options: &RunOptions,
    now: DateTime<Tz>,
) -> Result<RunOutcome, RunError> {
    if !options.local_only {
        config.require_delivery()?;
    }

    let registry = registry_for(config)?;
    let sources = registry.instantiate(config, options.only_source.as_deref())?;
    info!(count = sources.len(), "running sources");

    let aggregation = aggregator::aggregate(sources, now, config.source_timeout()).await;
    let health = aggregation.log_summary();

    let report = Report::new(&aggregation.buckets, now, &config.city)
        .with_sources(&aggregation.sources);
    let written = export::write_all(&config.output_dir, &report)?;
    let message = ChatExporter::default().message(&report);

    let message_id = if options.local_only {
        info!(dir = %config.output_dir.display(), "local run, skipping delivery");
        None
    } else {
        let poster = TelegramPoster::from_config(&config.telegram)?;
        Some(poster.post(&message).await?)
    };

    Ok(RunOutcome {
        aggregation,
        health,
        message,
        written,
        message_id,
    })
}
