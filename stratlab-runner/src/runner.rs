//! Single-run orchestration.
//!
//! Validates configuration, builds strategy definitions, streams the
//! market data once through the simulation in lockstep, derives the
//! summaries, and writes the artifact set.

use chrono::Datelike;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use stratlab_core::data::{AdjustmentTable, DataError, SnapshotReader, StreamOptions};
use stratlab_core::domain::MarketSnapshot;
use stratlab_core::engine::{
    ContributionPlan, EngineError, EngineSettings, Simulation, StrategyDef,
};
use stratlab_core::strategy::StrategyKind;

use crate::config::{
    build_strategy_defs, default_strategy_entries, load_strategy_file, ConfigError, EngineChoice,
    PriceSeriesMode, RunConfig,
};
use crate::metrics::{annual_summaries, terminal_summary, AnnualSummary, TerminalSummary};
use crate::reporting::artifacts::manifest::{ManifestWarnings, RowCounts, RunManifest};
use crate::reporting::{write_run_artifacts, ArtifactPaths, RunArtifacts};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("artifact error: {0}")]
    Artifact(#[source] anyhow::Error),
}

impl RunError {
    /// Process exit code per error taxonomy: 1 config, 2 data, 3
    /// runtime/accounting.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => 1,
            RunError::Data(_) | RunError::Artifact(_) => 2,
            RunError::Engine(_) => 3,
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub paths: ArtifactPaths,
    /// (strategy_id, final_equity), best first.
    pub final_equities: Vec<(String, f64)>,
    pub cancelled: bool,
}

/// Execute one full simulation run and write its artifacts.
pub fn execute_run(
    config: &RunConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let entries = match &config.strategy_file {
        Some(path) => load_strategy_file(path)?,
        None => default_strategy_entries(),
    };
    let defs = build_strategy_defs(&entries, config)?;
    let strategy_ids: Vec<String> = defs.iter().map(|d| d.strategy_id.clone()).collect();
    let symbol_filter = explicit_universe(&defs);

    let settings = EngineSettings {
        initial_capital: config.initial_capital,
        contribution: ContributionPlan {
            amount: config.contribution_amount,
            frequency: config.contribution_frequency,
        },
        execution: config.execution_params(),
        credit_dividends: config.credit_dividends,
        seed: config.seed,
    };
    let mut sim = Simulation::new(&settings, defs)?;
    if let Some(flag) = cancel {
        sim = sim.with_cancel(flag);
    }

    let adjustments = match config.price_series_mode {
        PriceSeriesMode::AsIs => AdjustmentTable::identity(),
        PriceSeriesMode::RawReconstructed => {
            AdjustmentTable::build(&config.data_path, config.start_date, config.end_date)?
        }
    };
    let mut opts = StreamOptions::new(config.start_date, config.end_date);
    opts.symbols = symbol_filter;
    opts.min_price = config.min_price;
    opts.max_price = config.max_price;
    opts.min_volume = config.min_volume;

    let started = Instant::now();
    let mut reader = SnapshotReader::open_adjusted(&config.data_path, opts, adjustments)?;
    let mut progress_year: Option<i32> = None;
    let mut announce = |snapshot: &MarketSnapshot| {
        if config.progress {
            let year = snapshot.date.year();
            if progress_year != Some(year) {
                tracing::info!(year, "simulating");
                progress_year = Some(year);
            }
        }
    };

    match config.engine {
        EngineChoice::Streaming => {
            for item in &mut reader {
                let snapshot = item?;
                announce(&snapshot);
                if !sim.step(&snapshot)? {
                    break;
                }
            }
        }
        EngineChoice::InMemory => {
            let mut snapshots = Vec::new();
            for item in &mut reader {
                snapshots.push(item?);
            }
            for snapshot in &snapshots {
                announce(snapshot);
                if !sim.step(snapshot)? {
                    break;
                }
            }
        }
    }
    let stats = reader.stats();
    let wall_time_secs = started.elapsed().as_secs_f64();
    let result = sim.finish();

    let mut annual: Vec<AnnualSummary> = Vec::new();
    let mut terminal: Vec<TerminalSummary> = Vec::new();
    let mut ordered: Vec<_> = result.records_by_strategy.iter().collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    for (strategy_id, records) in ordered {
        annual.extend(annual_summaries(
            strategy_id,
            records,
            config.initial_capital,
        ));
        let trades = result
            .ledger
            .iter()
            .filter(|e| &e.strategy_id == strategy_id)
            .count() as u64;
        if let Some(summary) =
            terminal_summary(strategy_id, records, trades, config.initial_capital)
        {
            terminal.push(summary);
        }
    }

    let manifest = RunManifest {
        version: env!("CARGO_PKG_VERSION").to_string(),
        config: config.clone(),
        strategy_ids,
        row_counts: RowCounts {
            rows_read: stats.rows_read,
            bars_used: stats.bars_used,
            bars_dropped: stats.bars_dropped,
            bars_filtered: stats.bars_filtered,
        },
        trading_days: result.trading_days,
        wall_time_secs,
        warnings: ManifestWarnings {
            invalid_bars: stats.bars_dropped,
            liquidity_clips: result.liquidity_clips,
            undersized_universes: result.infeasible_universes,
            messages: config.warnings(),
        },
        cancelled: result.cancelled,
    };

    let paths = write_run_artifacts(
        &config.output_dir,
        &RunArtifacts {
            records_by_strategy: &result.records_by_strategy,
            ledger: &result.ledger,
            annual: &annual,
            terminal: &terminal,
            manifest: &manifest,
        },
    )
    .map_err(RunError::Artifact)?;

    let mut final_equities: Vec<(String, f64)> = result
        .records_by_strategy
        .iter()
        .filter_map(|(id, records)| records.last().map(|r| (id.clone(), r.total_equity)))
        .collect();
    final_equities.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(RunOutcome {
        paths,
        final_equities,
        cancelled: result.cancelled,
    })
}

/// When every strategy trades a fixed symbol list, the reader can skip
/// everything else.
fn explicit_universe(defs: &[StrategyDef]) -> Option<BTreeSet<String>> {
    let mut union = BTreeSet::new();
    for def in defs {
        match &def.kind {
            StrategyKind::ExplicitSymbols { symbols } => {
                union.extend(symbols.iter().cloned());
            }
            _ => return None,
        }
    }
    if union.is_empty() {
        None
    } else {
        Some(union)
    }
}
