//! Artifact writers. Filenames and column layouts are fixed; numeric
//! cells carry ten fractional digits so reruns diff byte-for-byte.

pub mod equity;
pub mod manifest;
pub mod summary;
pub mod trades;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::metrics::{AnnualSummary, TerminalSummary};
use manifest::RunManifest;
use stratlab_core::engine::DailyRecord;
use stratlab_core::domain::LedgerEntry;

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub daily_equity: PathBuf,
    pub trades: PathBuf,
    pub annual_summary: PathBuf,
    pub terminal_summary: PathBuf,
    pub manifest: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            daily_equity: dir.join("daily_equity.csv"),
            trades: dir.join("trades.csv"),
            annual_summary: dir.join("annual_summary.csv"),
            terminal_summary: dir.join("terminal_summary.csv"),
            manifest: dir.join("run_manifest.json"),
        }
    }
}

/// Everything that lands in the run directory.
pub struct RunArtifacts<'a> {
    pub records_by_strategy: &'a [(String, Vec<DailyRecord>)],
    pub ledger: &'a [LedgerEntry],
    pub annual: &'a [AnnualSummary],
    pub terminal: &'a [TerminalSummary],
    pub manifest: &'a RunManifest,
}

pub fn write_run_artifacts(output_dir: &Path, artifacts: &RunArtifacts) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;
    let paths = ArtifactPaths::in_dir(output_dir);
    equity::write_daily_equity_csv(&paths.daily_equity, artifacts.records_by_strategy)?;
    trades::write_trades_csv(&paths.trades, artifacts.ledger)?;
    summary::write_annual_summary_csv(&paths.annual_summary, artifacts.annual)?;
    summary::write_terminal_summary_csv(&paths.terminal_summary, artifacts.terminal)?;
    manifest::write_manifest(&paths.manifest, artifacts.manifest)?;
    Ok(paths)
}
