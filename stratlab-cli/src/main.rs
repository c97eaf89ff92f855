//! StratLab CLI — run historical portfolio strategy simulations.
//!
//! Exit codes: 0 success, 1 config/validation error, 2 data error,
//! 3 runtime/accounting invariant violation.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use stratlab_core::engine::ContributionFrequency;
use stratlab_runner::config::{EngineChoice, PriceSeriesMode, RunConfig};
use stratlab_runner::runner::execute_run;

#[derive(Parser)]
#[command(name = "stratlab")]
#[command(about = "Deterministic historical portfolio strategy simulator", version)]
#[command(
    after_help = "Examples:\n  stratlab --data-path bars.csv --start-date 2000-01-03 \\\n    --end-date 2020-12-31 --initial-capital 10000 --strategy-file strategies.json\n"
)]
struct Cli {
    #[arg(long)]
    data_path: PathBuf,

    #[arg(long)]
    start_date: NaiveDate,

    #[arg(long)]
    end_date: NaiveDate,

    #[arg(long)]
    initial_capital: f64,

    #[arg(long, default_value_t = 0.0)]
    contribution_amount: f64,

    /// none, daily, monthly, or yearly.
    #[arg(long, default_value = "none")]
    contribution_frequency: String,

    #[arg(long, default_value_t = 0.0)]
    fee_bps: f64,

    #[arg(long, default_value_t = 0.0)]
    fee_fixed: f64,

    #[arg(long, default_value_t = 0.0)]
    slippage_bps: f64,

    /// Maximum fraction of a symbol's daily volume per fill.
    #[arg(long, default_value_t = 0.01)]
    max_trade_participation: f64,

    #[arg(long, default_value_t = false)]
    credit_dividends: bool,

    /// as_is or raw_reconstructed.
    #[arg(long, default_value = "as_is")]
    price_series_mode: String,

    /// JSON file with the strategy list; defaults to daily equal weight.
    #[arg(long)]
    strategy_file: Option<PathBuf>,

    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// streaming or in_memory.
    #[arg(long, default_value = "streaming")]
    engine: String,

    /// Log one line per simulated year.
    #[arg(long, default_value_t = false)]
    progress: bool,

    #[arg(long, default_value_t = 0.01)]
    min_price: f64,

    #[arg(long, default_value_t = 100_000.0)]
    max_price: f64,

    #[arg(long, default_value_t = 0.0)]
    min_volume: f64,
}

fn init_tracing() {
    let filter = std::env::var("STRATLAB_LOG").unwrap_or_else(|_| "info".to_string());
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_new(filter) {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

fn build_config(cli: &Cli) -> Result<RunConfig, String> {
    let contribution_frequency = ContributionFrequency::parse(&cli.contribution_frequency)
        .ok_or_else(|| format!("unknown contribution frequency '{}'", cli.contribution_frequency))?;
    let price_series_mode = PriceSeriesMode::parse(&cli.price_series_mode)
        .ok_or_else(|| format!("unknown price series mode '{}'", cli.price_series_mode))?;
    let engine = EngineChoice::parse(&cli.engine)
        .ok_or_else(|| format!("unknown engine '{}'", cli.engine))?;
    Ok(RunConfig {
        data_path: cli.data_path.clone(),
        start_date: cli.start_date,
        end_date: cli.end_date,
        initial_capital: cli.initial_capital,
        contribution_amount: cli.contribution_amount,
        contribution_frequency,
        fee_bps: cli.fee_bps,
        fee_fixed: cli.fee_fixed,
        slippage_bps: cli.slippage_bps,
        max_trade_participation: cli.max_trade_participation,
        credit_dividends: cli.credit_dividends,
        price_series_mode,
        engine,
        min_price: cli.min_price,
        max_price: cli.max_price,
        min_volume: cli.min_volume,
        seed: cli.seed,
        output_dir: cli.output_dir.clone(),
        strategy_file: cli.strategy_file.clone(),
        progress: cli.progress,
    })
}

fn main() {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version requests are not errors.
            if err.use_stderr() {
                eprintln!("{err}");
                std::process::exit(1);
            }
            err.exit();
        }
    };
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(1);
        }
    };

    match execute_run(&config, None) {
        Ok(outcome) => {
            if outcome.cancelled {
                println!("run cancelled (partial outputs written)");
            } else {
                println!("run complete");
            }
            println!("  daily_equity:     {}", outcome.paths.daily_equity.display());
            println!("  trades:           {}", outcome.paths.trades.display());
            println!("  annual_summary:   {}", outcome.paths.annual_summary.display());
            println!("  terminal_summary: {}", outcome.paths.terminal_summary.display());
            println!("  manifest:         {}", outcome.paths.manifest.display());
            for (strategy_id, final_equity) in &outcome.final_equities {
                println!("{strategy_id}: final_equity={final_equity:.2}");
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
