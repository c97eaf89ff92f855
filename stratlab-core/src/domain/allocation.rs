use std::collections::BTreeMap;
use thiserror::Error;

const WEIGHT_EPS: f64 = 1e-9;

/// Desired post-rebalance weight per symbol.
///
/// Weights are in `[0, 1]` and sum to at most 1; the remainder stays in
/// cash. The empty allocation is legal and means full cash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetAllocation {
    weights: BTreeMap<String, f64>,
}

impl TargetAllocation {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an allocation, validating weight bounds.
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self, AllocationError> {
        let mut sum = 0.0;
        for (symbol, &w) in &weights {
            if !w.is_finite() || !(-WEIGHT_EPS..=1.0 + WEIGHT_EPS).contains(&w) {
                return Err(AllocationError::WeightOutOfBounds {
                    symbol: symbol.clone(),
                    weight: w,
                });
            }
            sum += w;
        }
        if sum > 1.0 + WEIGHT_EPS {
            return Err(AllocationError::SumExceedsOne { sum });
        }
        Ok(Self { weights })
    }

    /// Equal weights over the given symbols, summing to 1.
    pub fn equal(symbols: &[String]) -> Self {
        if symbols.is_empty() {
            return Self::empty();
        }
        let w = 1.0 / symbols.len() as f64;
        Self {
            weights: symbols.iter().map(|s| (s.clone(), w)).collect(),
        }
    }

    /// Weights proportional to a positive metric, normalized to 1.
    /// Non-positive entries are dropped; an all-non-positive input yields
    /// the empty allocation.
    pub fn proportional(metrics: &[(String, f64)]) -> Self {
        let total: f64 = metrics.iter().filter(|(_, v)| *v > 0.0).map(|(_, v)| v).sum();
        if total <= 0.0 {
            return Self::empty();
        }
        Self {
            weights: metrics
                .iter()
                .filter(|(_, v)| *v > 0.0)
                .map(|(s, v)| (s.clone(), v / total))
                .collect(),
        }
    }

    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("weight for {symbol} out of bounds: {weight}")]
    WeightOutOfBounds { symbol: String, weight: f64 },

    #[error("weights sum to {sum}, which exceeds 1")]
    SumExceedsOne { sum: f64 },
}
