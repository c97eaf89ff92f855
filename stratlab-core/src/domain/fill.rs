use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// One executed trade.
///
/// `gross_value` is `shares * close` (the unslipped notional); `price` is
/// the executed price after directional slippage. The cash identity is
/// `net_cash_impact = -(gross + slippage + fee)` for buys and
/// `gross - slippage - fee` for sells.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub symbol: String,
    pub side: Side,
    pub shares: f64,
    pub price: f64,
    pub gross_value: f64,
    pub slippage_cost: f64,
    pub fee_cost: f64,
    pub net_cash_impact: f64,
}

impl Fill {
    pub fn total_cost(&self) -> f64 {
        self.slippage_cost + self.fee_cost
    }
}

/// A fill stamped with the date and strategy it belongs to, as stored in
/// the run-wide trade ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub strategy_id: String,
    pub fill: Fill,
}
