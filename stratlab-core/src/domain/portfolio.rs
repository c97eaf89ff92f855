use crate::domain::fill::{Fill, Side};
use crate::domain::position::Position;
use crate::domain::snapshot::MarketSnapshot;
use std::collections::BTreeMap;
use thiserror::Error;

/// Cash tolerance: balances below this magnitude count as zero.
pub const CASH_EPS: f64 = 1e-6;
/// Positions with fewer shares than this are closed out.
pub const SHARE_EPS: f64 = 1e-9;

/// Mutable accounting state owned by exactly one strategy run.
///
/// The accounting identity `total_equity = cash + Σ shares · last_close`
/// holds after every operation; `mark_to_market` values held symbols at
/// today's close when present and at their last seen close otherwise.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    cash: f64,
    positions: BTreeMap<String, Position>,
    last_close: BTreeMap<String, f64>,
    pub cumulative_contributions: f64,
    pub cumulative_costs: f64,
    pub cumulative_dividends: f64,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Result<Self, PortfolioError> {
        if initial_cash < 0.0 || !initial_cash.is_finite() {
            return Err(PortfolioError::NegativeAmount {
                amount: initial_cash,
            });
        }
        Ok(Self {
            cash: initial_cash,
            positions: BTreeMap::new(),
            last_close: BTreeMap::new(),
            cumulative_contributions: 0.0,
            cumulative_costs: 0.0,
            cumulative_dividends: 0.0,
        })
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn shares(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.shares)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn credit_cash(&mut self, amount: f64) -> Result<(), PortfolioError> {
        if amount < 0.0 || !amount.is_finite() {
            return Err(PortfolioError::NegativeAmount { amount });
        }
        self.cash += amount;
        Ok(())
    }

    pub fn debit_cash(&mut self, amount: f64) -> Result<(), PortfolioError> {
        if amount < 0.0 || !amount.is_finite() {
            return Err(PortfolioError::NegativeAmount { amount });
        }
        if amount > self.cash + CASH_EPS {
            return Err(PortfolioError::InsufficientCash {
                requested: amount,
                available: self.cash,
            });
        }
        self.cash -= amount;
        Ok(())
    }

    /// Credit a periodic contribution and track the running total.
    pub fn contribute(&mut self, amount: f64) -> Result<(), PortfolioError> {
        self.credit_cash(amount)?;
        self.cumulative_contributions += amount;
        Ok(())
    }

    /// Credit dividend cash for currently held shares. Returns the total
    /// credited.
    pub fn credit_dividends(&mut self, snapshot: &MarketSnapshot) -> f64 {
        let mut total = 0.0;
        for pos in self.positions.values() {
            if pos.shares <= 0.0 {
                continue;
            }
            if let Some(bar) = snapshot.bar(&pos.symbol) {
                if bar.dividend > 0.0 {
                    total += pos.shares * bar.dividend;
                }
            }
        }
        if total > 0.0 {
            self.cash += total;
            self.cumulative_dividends += total;
        }
        total
    }

    /// Refresh last-seen closes for held symbols that traded today.
    pub fn observe_closes(&mut self, snapshot: &MarketSnapshot) {
        let updates: Vec<(String, f64)> = self
            .positions
            .keys()
            .filter_map(|s| snapshot.close(s).map(|c| (s.clone(), c)))
            .collect();
        for (symbol, close) in updates {
            self.last_close.insert(symbol, close);
        }
    }

    /// Market value of all positions at their last observed close.
    ///
    /// A held symbol that has never been priced is an engine bug and
    /// fails loudly.
    pub fn positions_market_value(&self) -> Result<f64, PortfolioError> {
        let mut total = 0.0;
        for pos in self.positions.values() {
            let close = self.last_close.get(&pos.symbol).ok_or_else(|| {
                PortfolioError::UnpricedPosition {
                    symbol: pos.symbol.clone(),
                }
            })?;
            total += pos.market_value(*close);
        }
        Ok(total)
    }

    pub fn total_equity(&self) -> Result<f64, PortfolioError> {
        Ok(self.cash + self.positions_market_value()?)
    }

    /// Apply an executed fill: move cash by its net impact and update the
    /// symbol's position. Negative resulting cash is fatal — execution is
    /// responsible for never planning an infeasible fill.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), PortfolioError> {
        match fill.side {
            Side::Buy => {
                let pos = self
                    .positions
                    .entry(fill.symbol.clone())
                    .or_insert_with(|| Position::new(&fill.symbol));
                pos.add_shares(fill.shares, fill.price);
                // gross_value is shares * close, so this recovers the
                // unslipped close for the new position's mark.
                if fill.shares > 0.0 {
                    self.last_close
                        .insert(fill.symbol.clone(), fill.gross_value / fill.shares);
                }
            }
            Side::Sell => {
                let pos = self.positions.get_mut(&fill.symbol).ok_or_else(|| {
                    PortfolioError::Oversold {
                        symbol: fill.symbol.clone(),
                        requested: fill.shares,
                        held: 0.0,
                    }
                })?;
                if fill.shares > pos.shares + SHARE_EPS {
                    return Err(PortfolioError::Oversold {
                        symbol: fill.symbol.clone(),
                        requested: fill.shares,
                        held: pos.shares,
                    });
                }
                pos.remove_shares(fill.shares);
            }
        }
        self.cash += fill.net_cash_impact;
        self.cumulative_costs += fill.total_cost();
        if self.cash < -CASH_EPS {
            return Err(PortfolioError::NegativeCash { cash: self.cash });
        }
        if let Some(pos) = self.positions.get(&fill.symbol) {
            if pos.shares.abs() < SHARE_EPS {
                self.positions.remove(&fill.symbol);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("amount must be non-negative and finite, got {amount}")]
    NegativeAmount { amount: f64 },

    #[error("insufficient cash: requested {requested}, available {available}")]
    InsufficientCash { requested: f64, available: f64 },

    #[error("cash went negative after fill: {cash}")]
    NegativeCash { cash: f64 },

    #[error("sold more than held for {symbol}: requested {requested}, held {held}")]
    Oversold {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("held symbol {symbol} has no observed close")]
    UnpricedPosition { symbol: String },
}
