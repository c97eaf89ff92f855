//! Strategy plugins.
//!
//! The plugin set is a closed sum type registered at startup: determinism
//! and config validation both benefit from a known-closed set, so there
//! is no open registration. Every plugin is a pure function from
//! `(date, snapshot)` to a target allocation; `random_n` additionally
//! draws from a seeded per-date generator.

use crate::domain::{MarketSnapshot, TargetAllocation};
use crate::rng;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    ClosePrice,
    DollarVolume1d,
    RollingDollarVolume252d,
}

impl RankMetric {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "close_price" => Some(Self::ClosePrice),
            "dollar_volume_1d" => Some(Self::DollarVolume1d),
            "rolling_dollar_volume_252d" => Some(Self::RollingDollarVolume252d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClosePrice => "close_price",
            Self::DollarVolume1d => "dollar_volume_1d",
            Self::RollingDollarVolume252d => "rolling_dollar_volume_252d",
        }
    }
}

/// The v1 plugin set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// 1/N over every tradable symbol.
    EqualWeight,
    /// Top `top_n` by rolling dollar volume, weighted proportionally to
    /// the metric — the documented cap-proxy for a large-cap index.
    Sp500Proxy { top_n: usize },
    /// Configured list intersected with today's tradable symbols,
    /// equal-weighted.
    ExplicitSymbols { symbols: Vec<String> },
    /// Deterministic seeded sample of `n` tradable symbols.
    RandomN { n: usize },
    TopNRanked {
        n: usize,
        metric: RankMetric,
        proportional: bool,
    },
    BottomNRanked { n: usize, metric: RankMetric },
}

impl StrategyKind {
    pub fn plugin_name(&self) -> &'static str {
        match self {
            Self::EqualWeight => "equal_weight",
            Self::Sp500Proxy { .. } => "sp500_proxy",
            Self::ExplicitSymbols { .. } => "explicit_symbols",
            Self::RandomN { .. } => "random_n",
            Self::TopNRanked { .. } => "top_n_ranked",
            Self::BottomNRanked { .. } => "bottom_n_ranked",
        }
    }

    /// Whether this plugin ranks on the rolling dollar-volume feature.
    pub fn uses_rolling_feature(&self) -> bool {
        matches!(
            self,
            Self::Sp500Proxy { .. }
                | Self::TopNRanked {
                    metric: RankMetric::RollingDollarVolume252d,
                    ..
                }
                | Self::BottomNRanked {
                    metric: RankMetric::RollingDollarVolume252d,
                    ..
                }
        )
    }

    /// Fail fast on structurally invalid configurations.
    pub fn validate(&self) -> Result<(), StrategyError> {
        match self {
            Self::Sp500Proxy { top_n } if *top_n == 0 => Err(StrategyError::NonPositiveN {
                plugin: self.plugin_name(),
            }),
            Self::RandomN { n } | Self::TopNRanked { n, .. } | Self::BottomNRanked { n, .. }
                if *n == 0 =>
            {
                Err(StrategyError::NonPositiveN {
                    plugin: self.plugin_name(),
                })
            }
            Self::ExplicitSymbols { symbols } if symbols.is_empty() => {
                Err(StrategyError::EmptySymbolList)
            }
            _ => Ok(()),
        }
    }
}

/// A plugin decision plus whether the universe came up short of the
/// requested N (lenient mode only; strict mode fails instead).
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub allocation: TargetAllocation,
    pub undersized: bool,
}

impl StrategyOutcome {
    fn sized(allocation: TargetAllocation) -> Self {
        Self {
            allocation,
            undersized: false,
        }
    }
}

/// Compute target weights for one rebalance date.
pub fn target_weights(
    kind: &StrategyKind,
    date: NaiveDate,
    snapshot: &MarketSnapshot,
    seed: u64,
    strict: bool,
) -> Result<StrategyOutcome, StrategyError> {
    match kind {
        StrategyKind::EqualWeight => {
            let symbols: Vec<String> = snapshot.symbols().map(str::to_string).collect();
            Ok(StrategyOutcome::sized(TargetAllocation::equal(&symbols)))
        }
        StrategyKind::ExplicitSymbols { symbols } => {
            let selected: Vec<String> = symbols
                .iter()
                .filter(|s| snapshot.bar(s).is_some())
                .cloned()
                .collect();
            Ok(StrategyOutcome::sized(TargetAllocation::equal(&selected)))
        }
        StrategyKind::RandomN { n } => {
            let candidates: Vec<String> = snapshot.symbols().map(str::to_string).collect();
            if candidates.is_empty() {
                return Ok(StrategyOutcome::sized(TargetAllocation::empty()));
            }
            let undersized = candidates.len() < *n;
            if undersized && strict {
                return Err(StrategyError::UniverseTooSmall {
                    plugin: kind.plugin_name(),
                    requested: *n,
                    available: candidates.len(),
                });
            }
            let sample_size = (*n).min(candidates.len());
            let mut generator = rng::rebalance_rng(seed, date);
            let mut selected: Vec<String> =
                rand::seq::index::sample(&mut generator, candidates.len(), sample_size)
                    .into_iter()
                    .map(|i| candidates[i].clone())
                    .collect();
            selected.sort();
            Ok(StrategyOutcome {
                allocation: TargetAllocation::equal(&selected),
                undersized,
            })
        }
        StrategyKind::Sp500Proxy { top_n } => ranked_weights(
            kind,
            snapshot,
            *top_n,
            RankMetric::RollingDollarVolume252d,
            true,
            true,
            strict,
        ),
        StrategyKind::TopNRanked {
            n,
            metric,
            proportional,
        } => ranked_weights(kind, snapshot, *n, *metric, true, *proportional, strict),
        StrategyKind::BottomNRanked { n, metric } => {
            ranked_weights(kind, snapshot, *n, *metric, false, false, strict)
        }
    }
}

/// Positive metric values for every eligible symbol today. Symbols whose
/// rolling feature is still warming up are absent and therefore excluded.
fn metric_values(snapshot: &MarketSnapshot, metric: RankMetric) -> Vec<(String, f64)> {
    match metric {
        RankMetric::ClosePrice => snapshot
            .bars()
            .map(|(symbol, bar)| (symbol.to_string(), bar.close))
            .collect(),
        RankMetric::DollarVolume1d => snapshot
            .bars()
            .filter(|(_, bar)| bar.volume > 0)
            .map(|(symbol, bar)| (symbol.to_string(), bar.dollar_volume()))
            .collect(),
        RankMetric::RollingDollarVolume252d => snapshot
            .bars()
            .filter_map(|(symbol, _)| {
                snapshot
                    .rolling_dollar_volume(symbol)
                    .filter(|v| *v > 0.0)
                    .map(|v| (symbol.to_string(), v))
            })
            .collect(),
    }
}

fn ranked_weights(
    kind: &StrategyKind,
    snapshot: &MarketSnapshot,
    n: usize,
    metric: RankMetric,
    top: bool,
    proportional: bool,
    strict: bool,
) -> Result<StrategyOutcome, StrategyError> {
    let mut metrics = metric_values(snapshot, metric);
    // Ties break by symbol; metric_values came out in symbol order, so a
    // stable sort on the value alone preserves that.
    if top {
        metrics.sort_by(|a, b| b.1.total_cmp(&a.1));
    } else {
        metrics.sort_by(|a, b| a.1.total_cmp(&b.1));
    }
    let undersized = metrics.len() < n;
    if undersized && strict {
        return Err(StrategyError::UniverseTooSmall {
            plugin: kind.plugin_name(),
            requested: n,
            available: metrics.len(),
        });
    }
    metrics.truncate(n);
    let allocation = if proportional {
        TargetAllocation::proportional(&metrics)
    } else {
        let symbols: Vec<String> = metrics.into_iter().map(|(s, _)| s).collect();
        TargetAllocation::equal(&symbols)
    };
    Ok(StrategyOutcome {
        allocation,
        undersized,
    })
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("{plugin}: N must be positive")]
    NonPositiveN { plugin: &'static str },

    #[error("explicit_symbols requires a non-empty symbol list")]
    EmptySymbolList,

    #[error("{plugin}: universe has {available} symbols, {requested} requested (strict mode)")]
    UniverseTooSmall {
        plugin: &'static str,
        requested: usize,
        available: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
    }

    fn snapshot(entries: &[(&str, f64, u64)]) -> MarketSnapshot {
        let mut snap = MarketSnapshot::new(date());
        for (symbol, close, volume) in entries {
            snap.insert(Bar {
                date: date(),
                symbol: symbol.to_string(),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: *volume,
                dividend: 0.0,
                split: 1.0,
            });
        }
        snap
    }

    #[test]
    fn equal_weight_covers_all_tradable() {
        let snap = snapshot(&[("AAA", 1.0, 10), ("BBB", 2.0, 10), ("CCC", 3.0, 10)]);
        let outcome =
            target_weights(&StrategyKind::EqualWeight, date(), &snap, 0, false).unwrap();
        assert_eq!(outcome.allocation.len(), 3);
        assert!((outcome.allocation.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn equal_weight_empty_universe_is_cash() {
        let snap = snapshot(&[]);
        let outcome =
            target_weights(&StrategyKind::EqualWeight, date(), &snap, 0, false).unwrap();
        assert!(outcome.allocation.is_empty());
    }

    #[test]
    fn explicit_symbols_intersects_with_tradable() {
        let snap = snapshot(&[("AAA", 1.0, 10), ("BBB", 2.0, 10)]);
        let kind = StrategyKind::ExplicitSymbols {
            symbols: vec!["AAA".into(), "ZZZ".into()],
        };
        let outcome = target_weights(&kind, date(), &snap, 0, false).unwrap();
        assert_eq!(outcome.allocation.len(), 1);
        assert!((outcome.allocation.weight("AAA") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn random_n_is_reproducible_and_seed_sensitive() {
        let snap = snapshot(&[
            ("AAA", 1.0, 10),
            ("BBB", 1.0, 10),
            ("CCC", 1.0, 10),
            ("DDD", 1.0, 10),
            ("EEE", 1.0, 10),
        ]);
        let kind = StrategyKind::RandomN { n: 2 };
        let first = target_weights(&kind, date(), &snap, 42, false).unwrap();
        let second = target_weights(&kind, date(), &snap, 42, false).unwrap();
        assert_eq!(first.allocation, second.allocation);
        assert_eq!(first.allocation.len(), 2);

        // A different seed must diverge on at least one rebalance date.
        let mut diverged = false;
        for offset in 0..5 {
            let day = date() + chrono::Duration::days(offset);
            let a = target_weights(&kind, day, &snap, 42, false).unwrap();
            let b = target_weights(&kind, day, &snap, 43, false).unwrap();
            if a.allocation != b.allocation {
                diverged = true;
            }
        }
        assert!(diverged);
    }

    #[test]
    fn random_n_strict_fails_small_universe() {
        let snap = snapshot(&[("AAA", 1.0, 10)]);
        let kind = StrategyKind::RandomN { n: 3 };
        assert!(matches!(
            target_weights(&kind, date(), &snap, 42, true),
            Err(StrategyError::UniverseTooSmall { .. })
        ));
        // Lenient mode allocates to what exists and flags it.
        let outcome = target_weights(&kind, date(), &snap, 42, false).unwrap();
        assert!(outcome.undersized);
        assert_eq!(outcome.allocation.len(), 1);
    }

    #[test]
    fn top_n_by_close_breaks_ties_by_symbol() {
        let snap = snapshot(&[("BBB", 5.0, 10), ("AAA", 5.0, 10), ("CCC", 1.0, 10)]);
        let kind = StrategyKind::TopNRanked {
            n: 2,
            metric: RankMetric::ClosePrice,
            proportional: false,
        };
        let outcome = target_weights(&kind, date(), &snap, 0, false).unwrap();
        let selected: Vec<&String> = outcome.allocation.weights().keys().collect();
        assert_eq!(selected, vec!["AAA", "BBB"]);
    }

    #[test]
    fn bottom_n_selects_smallest() {
        let snap = snapshot(&[("AAA", 5.0, 10), ("BBB", 2.0, 10), ("CCC", 1.0, 10)]);
        let kind = StrategyKind::BottomNRanked {
            n: 2,
            metric: RankMetric::ClosePrice,
        };
        let outcome = target_weights(&kind, date(), &snap, 0, false).unwrap();
        let selected: Vec<&String> = outcome.allocation.weights().keys().collect();
        assert_eq!(selected, vec!["BBB", "CCC"]);
    }

    #[test]
    fn dollar_volume_metric_excludes_zero_volume() {
        let snap = snapshot(&[("AAA", 5.0, 0), ("BBB", 2.0, 10)]);
        let kind = StrategyKind::TopNRanked {
            n: 2,
            metric: RankMetric::DollarVolume1d,
            proportional: false,
        };
        let outcome = target_weights(&kind, date(), &snap, 0, false).unwrap();
        assert_eq!(outcome.allocation.len(), 1);
        assert!(outcome.allocation.weight("AAA") == 0.0);
    }

    #[test]
    fn proxy_excludes_warming_symbols_and_normalizes() {
        let mut snap = snapshot(&[("AAA", 5.0, 10), ("BBB", 2.0, 10), ("CCC", 1.0, 10)]);
        snap.set_rolling_dollar_volume("AAA", 300.0);
        snap.set_rolling_dollar_volume("BBB", 100.0);
        // CCC has no full window yet.
        let kind = StrategyKind::Sp500Proxy { top_n: 500 };
        let outcome = target_weights(&kind, date(), &snap, 0, false).unwrap();
        assert_eq!(outcome.allocation.len(), 2);
        assert!((outcome.allocation.weight("AAA") - 0.75).abs() < 1e-12);
        assert!((outcome.allocation.weight("BBB") - 0.25).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_zero_n() {
        assert!(StrategyKind::RandomN { n: 0 }.validate().is_err());
        assert!(StrategyKind::Sp500Proxy { top_n: 0 }.validate().is_err());
        assert!(StrategyKind::ExplicitSymbols { symbols: vec![] }
            .validate()
            .is_err());
        assert!(StrategyKind::EqualWeight.validate().is_ok());
    }
}
