//! Fetch → normalize → deduplicate → snapshot orchestration


use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::collectors::{FeedFetcher, RawPayload};
use crate::config::{AppConfig, FeedConfig};
use crate::enrichment::EnrichmentEngine;
use crate::models::{Indicator, IndicatorKey};
use crate::storage::SnapshotWriter;

/// Outcome of one pipeline run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub feeds_fetched: usize,
    pub feeds_failed: usize,
    pub feeds_skipped: usize,
    pub indicators_raw: usize,
    pub indicators_unique: usize,
    pub snapshot_path: Option<PathBuf>,
}

/// Drives every configured feed through the full pipeline
pub struct Pipeline {
    config: AppConfig,
    fetcher: FeedFetcher,
    enrichment: EnrichmentEngine,
    writer: SnapshotWriter,
}

impl Pipeline {
    pub fn new(config: AppConfig, enrichment: EnrichmentEngine) -> Self {
        let fetcher = FeedFetcher::new(
            config.raw_dir.clone(),
            config.fetch_attempts,
            config.retry_delay,
        );
        let writer = SnapshotWriter::new(config.parsed_dir.clone());

        Self {
            config,
            fetcher,
            enrichment,
            writer,
        }
    }

    /// Run the pipeline once. A feed failure costs only that feed's
    /// indicators; a snapshot write failure is fatal.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut indicators = Vec::new();

        for feed in &self.config.feeds {
            if !feed.configured {
                tracing::warn!(feed = %feed.name, "Skipping feed, credential not set");
                summary.feeds_skipped += 1;
                continue;
            }

            tracing::info!(feed = %feed.name, url = %feed.url, "Fetching feed");
            let fetched_at = Utc::now();

            match self.fetcher.fetch(feed, fetched_at).await {
                Ok(payload) => {
                    let values = extract_entries(&payload, feed);
                    tracing::info!(feed = %feed.name, entries = values.len(), "Feed fetched");
                    for value in values {
                        indicators.push(self.normalize(feed, value, fetched_at).await);
                    }
                    summary.feeds_fetched += 1;
                    metrics::counter!("feed_fetches_total").increment(1);
                }
                Err(e) => {
                    summary.feeds_failed += 1;
                    metrics::counter!("feed_fetch_failures_total").increment(1);
                    tracing::warn!(
                        feed = %feed.name,
                        error = %e,
                        "Feed fetch failed, contributing no indicators"
                    );
                }
            }
        }

        summary.indicators_raw = indicators.len();
        metrics::counter!("indicators_normalized_total").increment(indicators.len() as u64);

        let unique = deduplicate(indicators);
        summary.indicators_unique = unique.len();

        let written_at = Utc::now();
        let path = self
            .writer
            .write(&unique, written_at)
            .context("Failed to write snapshot")?;
        tracing::info!(
            path = %path.display(),
            indicators = unique.len(),
            "Snapshot written"
        );
        summary.snapshot_path = Some(path);

        Ok(summary)
    }

    /// Map one raw entry value into the unified record
    async fn normalize(
        &self,
        feed: &FeedConfig,
        value: String,
        seen_at: DateTime<Utc>,
    ) -> Indicator {
        let enrichment = self.enrichment.enrich(feed.indicator_type, &value).await;

        Indicator {
            indicator: value,
            indicator_type: feed.indicator_type,
            threat_type: self.config.threat_type.clone(),
            source: feed.name.clone(),
            first_seen: seen_at,
            last_seen: seen_at,
            confidence: self.config.confidence,
            enrichment,
        }
    }
}

/// Pull indicator values out of a payload according to the feed's shape hints
fn extract_entries(payload: &RawPayload, feed: &FeedConfig) -> Vec<String> {
    match payload {
        RawPayload::List(items) => items.iter().filter_map(|v| entry_value(v, feed)).collect(),
        RawPayload::Object(map) => map
            .get(&feed.list_field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| entry_value(v, feed)).collect())
            .unwrap_or_default(),
        RawPayload::Text(_) => Vec::new(),
    }
}

fn entry_value(entry: &Value, feed: &FeedConfig) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(fields) => match fields.get(&feed.value_field).and_then(Value::as_str) {
            Some(s) => Some(s.to_string()),
            None => {
                tracing::debug!(
                    feed = %feed.name,
                    field = %feed.value_field,
                    "Entry missing value field, skipped"
                );
                None
            }
        },
        _ => None,
    }
}

/// Collapse duplicates across feeds; the first occurrence of each
/// (value, type) pair wins, later records are discarded unmerged
pub fn deduplicate(indicators: Vec<Indicator>) -> Vec<Indicator> {
    let mut seen: HashSet<IndicatorKey> = HashSet::with_capacity(indicators.len());
    indicators
        .into_iter()
        .filter(|indicator| seen.insert(indicator.key()))
        .collect()
}
