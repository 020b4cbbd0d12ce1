//! Snapshot persistence

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::models::Indicator;

/// Writes one timestamped, pretty-printed snapshot per run. Prior
/// snapshots are never touched; each run appends a new file.
pub struct SnapshotWriter {
    parsed_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(parsed_dir: impl Into<PathBuf>) -> Self {
        Self {
            parsed_dir: parsed_dir.into(),
        }
    }

    /// Serialize the deduplicated indicator set. Failure here is fatal to
    /// the run; there is no fallback location.
    pub fn write(&self, indicators: &[Indicator], written_at: DateTime<Utc>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.parsed_dir).with_context(|| {
            format!(
                "Failed to create snapshot directory {}",
                self.parsed_dir.display()
            )
        })?;

        let path = self
            .parsed_dir
            .join(format!("parsed_{}.json", written_at.format("%Y%m%d%H%M%S")));
        let body =
            serde_json::to_string_pretty(indicators).context("Failed to serialize snapshot")?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;

        Ok(path)
    }
}
