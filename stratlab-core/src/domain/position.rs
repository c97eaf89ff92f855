use serde::{Deserialize, Serialize};

/// Per-symbol holding. Created on the first buy and removed once the
/// share count rounds to zero. The average cost basis is informational
/// and plays no role in valuation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
}

impl Position {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            shares: 0.0,
            avg_cost: 0.0,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    /// Fold a buy into the average cost basis.
    pub fn add_shares(&mut self, shares: f64, price: f64) {
        let total = self.shares + shares;
        if total > 0.0 {
            self.avg_cost = (self.shares * self.avg_cost + shares * price) / total;
        }
        self.shares = total;
    }

    pub fn remove_shares(&mut self, shares: f64) {
        self.shares -= shares;
    }
}
