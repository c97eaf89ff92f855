use crate::domain::bar::Bar;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// All valid bars for one trading date, indexed by symbol, plus derived
/// per-symbol rolling features.
///
/// Snapshots are emitted by the data source in strictly ascending date
/// order; each symbol appears at most once. `rolling_dollar_volume`
/// contains an entry only for symbols whose rolling window is full —
/// absence stands in for an undefined (NaN) feature value, which keeps
/// rank-based selectors from ever seeing a partial sum.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    bars: BTreeMap<String, Bar>,
    rolling_dollar_volume: BTreeMap<String, f64>,
}

impl MarketSnapshot {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            bars: BTreeMap::new(),
            rolling_dollar_volume: BTreeMap::new(),
        }
    }

    /// Insert a bar, replacing any previous bar for the same symbol.
    pub fn insert(&mut self, bar: Bar) {
        self.bars.insert(bar.symbol.clone(), bar);
    }

    pub fn set_rolling_dollar_volume(&mut self, symbol: &str, value: f64) {
        self.rolling_dollar_volume.insert(symbol.to_string(), value);
    }

    pub fn bar(&self, symbol: &str) -> Option<&Bar> {
        self.bars.get(symbol)
    }

    /// Close price for a symbol, if it traded today.
    pub fn close(&self, symbol: &str) -> Option<f64> {
        self.bars.get(symbol).map(|b| b.close)
    }

    /// Rolling 252-day dollar volume, present only once the window is full.
    pub fn rolling_dollar_volume(&self, symbol: &str) -> Option<f64> {
        self.rolling_dollar_volume.get(symbol).copied()
    }

    /// Symbols with a valid bar today, in lexicographic order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    pub fn bars(&self) -> impl Iterator<Item = (&str, &Bar)> {
        self.bars.iter().map(|(s, b)| (s.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
