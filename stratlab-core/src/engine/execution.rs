//! Cost and execution model.
//!
//! Turns a target allocation into a deterministic list of fills:
//! sells execute before buys so proceeds fund purchases, and within a
//! side symbols fill in lexicographic order. Slippage is directional
//! (buyers pay up, sellers receive less), fees are `bps + fixed` per
//! trade, and per-symbol fills are capped at a fraction of the day's
//! volume. A cap that binds clips the trade rather than rejecting it.

use crate::domain::portfolio::{PortfolioError, PortfolioState, CASH_EPS, SHARE_EPS};
use crate::domain::{Fill, MarketSnapshot, Side, TargetAllocation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Trades below this fraction of equity are suppressed to prevent churn.
const TRADE_EPS_FRACTION: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionParams {
    pub fee_bps: f64,
    pub fee_fixed: f64,
    pub slippage_bps: f64,
    /// Maximum fraction of a symbol's daily volume one fill may consume.
    pub max_participation: f64,
}

impl ExecutionParams {
    pub fn frictionless() -> Self {
        Self {
            fee_bps: 0.0,
            fee_fixed: 0.0,
            slippage_bps: 0.0,
            max_participation: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlannedTrades {
    /// Sells first, then buys; lexicographic by symbol within a side.
    pub fills: Vec<Fill>,
    /// Number of trades clipped (or skipped outright) by the
    /// participation cap.
    pub liquidity_clips: u32,
}

impl PlannedTrades {
    pub fn gross_total(&self) -> f64 {
        self.fills.iter().map(|f| f.gross_value).sum()
    }
}

/// Plan the fills that move `portfolio` toward `target`.
///
/// The valuation basis is total equity after contributions and dividends
/// but before trades; execution prices are today's closes. The returned
/// fills are feasible: applying them in order never takes cash negative.
pub fn plan_rebalance(
    portfolio: &PortfolioState,
    snapshot: &MarketSnapshot,
    target: &TargetAllocation,
    params: &ExecutionParams,
) -> Result<PlannedTrades, PortfolioError> {
    let equity = portfolio.total_equity()?;
    let mut planned = PlannedTrades::default();
    if equity <= 0.0 {
        return Ok(planned);
    }
    let trade_eps = TRADE_EPS_FRACTION * equity;

    let mut symbols: BTreeSet<&str> = target.weights().keys().map(String::as_str).collect();
    for pos in portfolio.positions() {
        symbols.insert(&pos.symbol);
    }

    // (symbol, shares, close) per side; BTreeSet iteration already gives
    // lexicographic order.
    let mut sells: Vec<(String, f64, f64)> = Vec::new();
    let mut buys: Vec<(String, f64, f64)> = Vec::new();

    for symbol in symbols {
        let Some(bar) = snapshot.bar(symbol) else {
            continue; // not tradable today; position stays marked
        };
        let close = bar.close;
        if close <= 0.0 {
            continue;
        }
        let held = portfolio.shares(symbol);
        let delta_value = target.weight(symbol) * equity - held * close;
        let mut shares = (delta_value / close).abs();
        if shares < SHARE_EPS {
            continue;
        }

        let cap = params.max_participation * bar.volume as f64;
        if shares > cap {
            planned.liquidity_clips += 1;
            shares = cap;
        }
        if shares < SHARE_EPS {
            continue;
        }
        if delta_value < 0.0 {
            shares = shares.min(held);
        }
        if shares * close < trade_eps {
            continue;
        }
        if delta_value < 0.0 {
            sells.push((symbol.to_string(), shares, close));
        } else {
            buys.push((symbol.to_string(), shares, close));
        }
    }

    let mut cash = portfolio.cash();
    for (symbol, shares, close) in sells {
        let fill = build_fill(&symbol, Side::Sell, shares, close, params);
        cash += fill.net_cash_impact;
        planned.fills.push(fill);
    }
    for (symbol, shares, close) in buys {
        // Per-share cost including slippage and proportional fee; scale
        // the buy down when the remaining cash cannot cover it.
        let per_share =
            close * (1.0 + (params.slippage_bps + params.fee_bps) / 10_000.0);
        let affordable = (cash - params.fee_fixed) / per_share;
        let shares = shares.min(affordable.max(0.0));
        if shares < SHARE_EPS || shares * close < trade_eps {
            continue;
        }
        let fill = build_fill(&symbol, Side::Buy, shares, close, params);
        cash += fill.net_cash_impact;
        debug_assert!(cash >= -CASH_EPS, "planned buys overdrew cash: {cash}");
        planned.fills.push(fill);
    }
    Ok(planned)
}

fn build_fill(symbol: &str, side: Side, shares: f64, close: f64, params: &ExecutionParams) -> Fill {
    let gross = shares * close;
    let slip_fraction = params.slippage_bps / 10_000.0;
    let price = match side {
        Side::Buy => close * (1.0 + slip_fraction),
        Side::Sell => close * (1.0 - slip_fraction),
    };
    let slippage_cost = gross * slip_fraction;
    let fee_cost = gross * params.fee_bps / 10_000.0 + params.fee_fixed;
    let net_cash_impact = match side {
        Side::Buy => -(gross + slippage_cost + fee_cost),
        Side::Sell => gross - slippage_cost - fee_cost,
    };
    Fill {
        symbol: symbol.to_string(),
        side,
        shares,
        price,
        gross_value: gross,
        slippage_cost,
        fee_cost,
        net_cash_impact,
    }
}
