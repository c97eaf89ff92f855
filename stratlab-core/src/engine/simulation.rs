//! Daily event loop.
//!
//! One `Simulation` advances N strategies in lockstep over a shared
//! snapshot stream, one forward pass regardless of strategy count. Per
//! strategy per date the order is fixed: observe closes, credit
//! dividends, credit contribution, rebalance, mark to market, record.
//! An independent cash reconciliation runs every day; divergence beyond
//! epsilon aborts the run.

use crate::domain::portfolio::{PortfolioError, PortfolioState, CASH_EPS};
use crate::domain::{LedgerEntry, MarketSnapshot};
use crate::engine::execution::{plan_rebalance, ExecutionParams};
use crate::engine::schedule::{
    contribution_due, rebalance_due, ContributionFrequency, RebalanceFrequency,
};
use crate::strategy::{self, StrategyError, StrategyKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Absolute floor of the daily cash reconciliation tolerance.
const RECON_EPS_ABS: f64 = 1e-6;
/// Relative component, scaled by equity.
const RECON_EPS_REL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContributionPlan {
    pub amount: f64,
    pub frequency: ContributionFrequency,
}

/// Run-wide settings shared by every strategy unless overridden.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub initial_capital: f64,
    pub contribution: ContributionPlan,
    pub execution: ExecutionParams,
    pub credit_dividends: bool,
    pub seed: u64,
}

/// One strategy's validated definition, built from config.
#[derive(Debug, Clone)]
pub struct StrategyDef {
    pub strategy_id: String,
    pub kind: StrategyKind,
    pub rebalance: RebalanceFrequency,
    pub strict: bool,
    pub seed: Option<u64>,
    pub contribution_override: Option<ContributionPlan>,
    pub execution_override: Option<ExecutionParams>,
}

/// Daily accounting row for one strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub strategy_id: String,
    pub cash: f64,
    pub positions_market_value: f64,
    pub total_equity: f64,
    pub daily_return: f64,
    pub cumulative_return: f64,
    pub contribution_cumulative: f64,
    pub trade_count_day: u32,
    pub turnover_day: f64,
}

struct StrategyRun {
    strategy_id: String,
    kind: StrategyKind,
    rebalance: RebalanceFrequency,
    strict: bool,
    seed: u64,
    contribution: ContributionPlan,
    execution: ExecutionParams,
    portfolio: PortfolioState,
    last_rebalance: Option<NaiveDate>,
    last_contribution: Option<NaiveDate>,
    prev_equity: Option<f64>,
    first_equity: Option<f64>,
    records: Vec<DailyRecord>,
}

pub struct Simulation {
    credit_dividends: bool,
    runs: Vec<StrategyRun>,
    ledger: Vec<LedgerEntry>,
    cancel: Option<Arc<AtomicBool>>,
    cancelled: bool,
    trading_days: u32,
    liquidity_clips: u64,
    infeasible_universes: u64,
}

/// Everything a reporter needs: per-strategy daily records in config
/// order, the dated trade ledger, and warning counters.
#[derive(Debug)]
pub struct SimulationResult {
    pub records_by_strategy: Vec<(String, Vec<DailyRecord>)>,
    pub ledger: Vec<LedgerEntry>,
    pub cancelled: bool,
    pub trading_days: u32,
    pub liquidity_clips: u64,
    pub infeasible_universes: u64,
}

impl Simulation {
    pub fn new(settings: &EngineSettings, defs: Vec<StrategyDef>) -> Result<Self, EngineError> {
        let mut runs = Vec::with_capacity(defs.len());
        for def in defs {
            def.kind.validate().map_err(|source| EngineError::Strategy {
                strategy_id: def.strategy_id.clone(),
                date: None,
                source,
            })?;
            let portfolio = PortfolioState::new(settings.initial_capital).map_err(|source| {
                EngineError::Portfolio {
                    strategy_id: def.strategy_id.clone(),
                    date: None,
                    source,
                }
            })?;
            runs.push(StrategyRun {
                strategy_id: def.strategy_id,
                kind: def.kind,
                rebalance: def.rebalance,
                strict: def.strict,
                seed: def.seed.unwrap_or(settings.seed),
                contribution: def.contribution_override.unwrap_or(settings.contribution),
                execution: def.execution_override.unwrap_or(settings.execution),
                portfolio,
                last_rebalance: None,
                last_contribution: None,
                prev_equity: None,
                first_equity: None,
                records: Vec::new(),
            });
        }
        Ok(Self {
            credit_dividends: settings.credit_dividends,
            runs,
            ledger: Vec::new(),
            cancel: None,
            cancelled: false,
            trading_days: 0,
            liquidity_clips: 0,
            infeasible_universes: 0,
        })
    }

    /// Install a cooperative cancellation flag, checked between dates.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Advance every strategy through one trading date. Returns `false`
    /// once cancellation has been requested; callers should stop feeding
    /// snapshots and call `finish`.
    pub fn step(&mut self, snapshot: &MarketSnapshot) -> Result<bool, EngineError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                self.cancelled = true;
                return Ok(false);
            }
        }
        self.trading_days += 1;
        let date = snapshot.date;

        for run in &mut self.runs {
            run.portfolio.observe_closes(snapshot);
            let cash_before = run.portfolio.cash();

            let dividends = if self.credit_dividends {
                run.portfolio.credit_dividends(snapshot)
            } else {
                0.0
            };

            let mut contribution_today = 0.0;
            if run.contribution.amount > 0.0
                && contribution_due(run.last_contribution, date, run.contribution.frequency)
            {
                run.portfolio
                    .contribute(run.contribution.amount)
                    .map_err(|source| EngineError::Portfolio {
                        strategy_id: run.strategy_id.clone(),
                        date: Some(date),
                        source,
                    })?;
                run.last_contribution = Some(date);
                contribution_today = run.contribution.amount;
            }

            let mut gross_traded = 0.0;
            let mut trade_count = 0u32;
            let mut fills_net = 0.0;
            if rebalance_due(run.last_rebalance, date, run.rebalance) {
                let outcome =
                    strategy::target_weights(&run.kind, date, snapshot, run.seed, run.strict)
                        .map_err(|source| EngineError::Strategy {
                            strategy_id: run.strategy_id.clone(),
                            date: Some(date),
                            source,
                        })?;
                if outcome.undersized {
                    self.infeasible_universes += 1;
                    tracing::warn!(
                        strategy_id = %run.strategy_id,
                        date = %date,
                        "universe smaller than requested; allocating to available symbols"
                    );
                }
                let planned = plan_rebalance(
                    &run.portfolio,
                    snapshot,
                    &outcome.allocation,
                    &run.execution,
                )
                .map_err(|source| EngineError::Portfolio {
                    strategy_id: run.strategy_id.clone(),
                    date: Some(date),
                    source,
                })?;
                self.liquidity_clips += u64::from(planned.liquidity_clips);
                for fill in planned.fills {
                    run.portfolio
                        .apply_fill(&fill)
                        .map_err(|source| EngineError::Portfolio {
                            strategy_id: run.strategy_id.clone(),
                            date: Some(date),
                            source,
                        })?;
                    gross_traded += fill.gross_value;
                    fills_net += fill.net_cash_impact;
                    trade_count += 1;
                    self.ledger.push(LedgerEntry {
                        date,
                        strategy_id: run.strategy_id.clone(),
                        fill,
                    });
                }
                run.last_rebalance = Some(date);
            }

            // Independent cash reconciliation: the portfolio's cash must
            // equal yesterday's cash plus today's external flows and fill
            // impacts.
            let cash = run.portfolio.cash();
            let expected_cash = cash_before + dividends + contribution_today + fills_net;
            let positions_market_value =
                run.portfolio
                    .positions_market_value()
                    .map_err(|source| EngineError::Portfolio {
                        strategy_id: run.strategy_id.clone(),
                        date: Some(date),
                        source,
                    })?;
            let total_equity = cash + positions_market_value;
            let tolerance = RECON_EPS_ABS + RECON_EPS_REL * total_equity.abs();
            if (cash - expected_cash).abs() > tolerance || cash < -CASH_EPS {
                return Err(EngineError::AccountingInvariant {
                    strategy_id: run.strategy_id.clone(),
                    date,
                    expected_cash,
                    actual_cash: cash,
                });
            }

            let daily_return = match run.prev_equity {
                None => 0.0,
                Some(prev) if prev == 0.0 => f64::NAN,
                Some(prev) => (total_equity - prev - contribution_today) / prev,
            };
            let turnover_day = match run.prev_equity {
                Some(prev) if prev > 0.0 => gross_traded / prev,
                _ => 0.0,
            };
            let first_equity = *run.first_equity.get_or_insert(total_equity);
            let cumulative_return = if first_equity == 0.0 {
                0.0
            } else {
                total_equity / first_equity - 1.0
            };

            run.records.push(DailyRecord {
                date,
                strategy_id: run.strategy_id.clone(),
                cash,
                positions_market_value,
                total_equity,
                daily_return,
                cumulative_return,
                contribution_cumulative: run.portfolio.cumulative_contributions,
                trade_count_day: trade_count,
                turnover_day,
            });
            run.prev_equity = Some(total_equity);
        }
        Ok(true)
    }

    pub fn finish(self) -> SimulationResult {
        SimulationResult {
            records_by_strategy: self
                .runs
                .into_iter()
                .map(|run| (run.strategy_id, run.records))
                .collect(),
            ledger: self.ledger,
            cancelled: self.cancelled,
            trading_days: self.trading_days,
            liquidity_clips: self.liquidity_clips,
            infeasible_universes: self.infeasible_universes,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("strategy {strategy_id}{}: {source}", fmt_date(.date))]
    Portfolio {
        strategy_id: String,
        date: Option<NaiveDate>,
        source: PortfolioError,
    },

    #[error("strategy {strategy_id}{}: {source}", fmt_date(.date))]
    Strategy {
        strategy_id: String,
        date: Option<NaiveDate>,
        source: StrategyError,
    },

    #[error(
        "accounting invariant violated for {strategy_id} on {date}: \
         expected cash {expected_cash}, actual {actual_cash}"
    )]
    AccountingInvariant {
        strategy_id: String,
        date: NaiveDate,
        expected_cash: f64,
        actual_cash: f64,
    },
}

fn fmt_date(date: &Option<NaiveDate>) -> String {
    date.map_or(String::new(), |d| format!(" on {d}"))
}
