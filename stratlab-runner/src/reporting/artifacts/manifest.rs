//! Run manifest export (JSON).

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::RunConfig;

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    /// Crate version that produced the run.
    pub version: String,
    /// Full echo of the effective run configuration.
    pub config: RunConfig,
    pub strategy_ids: Vec<String>,
    pub row_counts: RowCounts,
    pub trading_days: u32,
    pub wall_time_secs: f64,
    pub warnings: ManifestWarnings,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RowCounts {
    pub rows_read: u64,
    pub bars_used: u64,
    pub bars_dropped: u64,
    pub bars_filtered: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ManifestWarnings {
    /// Invalid bars dropped by the reader.
    pub invalid_bars: u64,
    /// Fills clipped or skipped by the participation cap.
    pub liquidity_clips: u64,
    /// Lenient-mode rebalances with a universe smaller than requested.
    pub undersized_universes: u64,
    /// Free-form configuration warnings.
    pub messages: Vec<String>,
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json =
        serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write manifest to {}", path.display()))?;
    Ok(())
}
