//! Run configuration and strategy-file parsing.
//!
//! All structural validation happens here, before any data is opened:
//! unknown plugins, unknown frequencies and metrics, non-positive N,
//! duplicate strategy ids, and unknown JSON fields all fail fast with a
//! structured error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use stratlab_core::engine::{
    ContributionFrequency, ContributionPlan, ExecutionParams, RebalanceFrequency, StrategyDef,
};
use stratlab_core::strategy::{RankMetric, StrategyKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSeriesMode {
    AsIs,
    RawReconstructed,
}

impl PriceSeriesMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "as_is" => Some(Self::AsIs),
            "raw_reconstructed" => Some(Self::RawReconstructed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AsIs => "as_is",
            Self::RawReconstructed => "raw_reconstructed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineChoice {
    Streaming,
    InMemory,
}

impl EngineChoice {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "streaming" => Some(Self::Streaming),
            "in_memory" => Some(Self::InMemory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::InMemory => "in_memory",
        }
    }
}

/// Global run settings shared across all strategies.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub data_path: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub contribution_amount: f64,
    pub contribution_frequency: ContributionFrequency,
    pub fee_bps: f64,
    pub fee_fixed: f64,
    pub slippage_bps: f64,
    pub max_trade_participation: f64,
    pub credit_dividends: bool,
    pub price_series_mode: PriceSeriesMode,
    pub engine: EngineChoice,
    pub min_price: f64,
    pub max_price: f64,
    pub min_volume: f64,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub strategy_file: Option<PathBuf>,
    pub progress: bool,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_date < self.start_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.initial_capital < 0.0 {
            return Err(ConfigError::invalid("initial-capital must be non-negative"));
        }
        if self.contribution_amount < 0.0 {
            return Err(ConfigError::invalid(
                "contribution-amount must be non-negative",
            ));
        }
        if self.fee_bps < 0.0 || self.fee_fixed < 0.0 || self.slippage_bps < 0.0 {
            return Err(ConfigError::invalid(
                "fee and slippage inputs must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_trade_participation) {
            return Err(ConfigError::invalid(
                "max-trade-participation must be within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Non-fatal configuration warnings, surfaced in the manifest.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.credit_dividends && self.price_series_mode == PriceSeriesMode::AsIs {
            warnings.push(
                "credit-dividends with price-series-mode=as_is may double count \
                 dividends if the input close is already adjusted"
                    .to_string(),
            );
        }
        warnings
    }

    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams {
            fee_bps: self.fee_bps,
            fee_fixed: self.fee_fixed,
            slippage_bps: self.slippage_bps,
            max_participation: self.max_trade_participation,
        }
    }
}

// ─── Strategy file ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyFile {
    pub strategies: Vec<StrategyEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyEntry {
    pub strategy_id: String,
    pub plugin: String,
    #[serde(default)]
    pub universe: UniverseSection,
    #[serde(default)]
    pub weights: WeightsSection,
    #[serde(default)]
    pub rebalance: RebalanceSection,
    #[serde(default)]
    pub contributions: Option<ContributionSection>,
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub execution: Option<ExecutionSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniverseSection {
    pub n: Option<i64>,
    pub top_n: Option<i64>,
    pub symbols: Option<Vec<String>>,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightsSection {
    pub scheme: Option<String>,
    pub metric: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RebalanceSection {
    pub frequency: String,
}

impl Default for RebalanceSection {
    fn default() -> Self {
        Self {
            frequency: "daily".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContributionSection {
    pub amount: f64,
    pub frequency: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionSection {
    pub fee_bps: Option<f64>,
    pub fee_fixed: Option<f64>,
    pub slippage_bps: Option<f64>,
    pub max_trade_participation: Option<f64>,
}

pub fn load_strategy_file(path: &Path) -> Result<Vec<StrategyEntry>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_strategy_json(&text)
}

pub fn parse_strategy_json(text: &str) -> Result<Vec<StrategyEntry>, ConfigError> {
    let file: StrategyFile =
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    if file.strategies.is_empty() {
        return Err(ConfigError::EmptyStrategyList);
    }
    Ok(file.strategies)
}

/// The default strategy when no file is given.
pub fn default_strategy_entries() -> Vec<StrategyEntry> {
    vec![StrategyEntry {
        strategy_id: "equal_weight_daily_default".to_string(),
        plugin: "equal_weight".to_string(),
        universe: UniverseSection::default(),
        weights: WeightsSection::default(),
        rebalance: RebalanceSection::default(),
        contributions: None,
        random_seed: None,
        execution: None,
    }]
}

/// Resolve parsed entries into validated engine definitions.
pub fn build_strategy_defs(
    entries: &[StrategyEntry],
    config: &RunConfig,
) -> Result<Vec<StrategyDef>, ConfigError> {
    let mut defs: Vec<StrategyDef> = Vec::with_capacity(entries.len());
    for entry in entries {
        if defs.iter().any(|d| d.strategy_id == entry.strategy_id) {
            return Err(ConfigError::DuplicateStrategyId {
                id: entry.strategy_id.clone(),
            });
        }
        let kind = build_kind(entry)?;
        kind.validate().map_err(|e| ConfigError::InvalidStrategy {
            id: entry.strategy_id.clone(),
            message: e.to_string(),
        })?;
        let rebalance =
            RebalanceFrequency::parse(&entry.rebalance.frequency).ok_or_else(|| {
                ConfigError::UnknownFrequency {
                    id: entry.strategy_id.clone(),
                    value: entry.rebalance.frequency.clone(),
                }
            })?;
        let contribution_override = entry
            .contributions
            .as_ref()
            .map(|section| {
                let frequency =
                    ContributionFrequency::parse(&section.frequency).ok_or_else(|| {
                        ConfigError::UnknownFrequency {
                            id: entry.strategy_id.clone(),
                            value: section.frequency.clone(),
                        }
                    })?;
                if section.amount < 0.0 {
                    return Err(ConfigError::InvalidStrategy {
                        id: entry.strategy_id.clone(),
                        message: "contribution amount must be non-negative".to_string(),
                    });
                }
                Ok(ContributionPlan {
                    amount: section.amount,
                    frequency,
                })
            })
            .transpose()?;
        let execution_override = entry.execution.as_ref().map(|section| ExecutionParams {
            fee_bps: section.fee_bps.unwrap_or(config.fee_bps),
            fee_fixed: section.fee_fixed.unwrap_or(config.fee_fixed),
            slippage_bps: section.slippage_bps.unwrap_or(config.slippage_bps),
            max_participation: section
                .max_trade_participation
                .unwrap_or(config.max_trade_participation),
        });
        defs.push(StrategyDef {
            strategy_id: entry.strategy_id.clone(),
            kind,
            rebalance,
            strict: entry.universe.strict,
            seed: entry.random_seed,
            contribution_override,
            execution_override,
        });
    }
    Ok(defs)
}

fn build_kind(entry: &StrategyEntry) -> Result<StrategyKind, ConfigError> {
    let id = &entry.strategy_id;
    let require_n = |value: Option<i64>, field: &'static str| -> Result<usize, ConfigError> {
        let raw = value.ok_or_else(|| ConfigError::MissingField {
            id: id.clone(),
            field,
        })?;
        usize::try_from(raw)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::NonPositiveN { id: id.clone() })
    };
    let metric = || -> Result<RankMetric, ConfigError> {
        match entry.weights.metric.as_deref() {
            None => Ok(RankMetric::ClosePrice),
            Some(raw) => RankMetric::parse(raw).ok_or_else(|| ConfigError::UnknownMetric {
                id: id.clone(),
                value: raw.to_string(),
            }),
        }
    };
    let proportional = || -> Result<bool, ConfigError> {
        match entry.weights.scheme.as_deref() {
            None | Some("equal") => Ok(false),
            Some("metric_proportional") => Ok(true),
            Some(other) => Err(ConfigError::UnknownWeightScheme {
                id: id.clone(),
                value: other.to_string(),
            }),
        }
    };

    match entry.plugin.as_str() {
        "equal_weight" => Ok(StrategyKind::EqualWeight),
        "sp500_proxy" => {
            let top_n = match entry.universe.top_n {
                Some(raw) => usize::try_from(raw)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ConfigError::NonPositiveN { id: id.clone() })?,
                None => 500,
            };
            Ok(StrategyKind::Sp500Proxy { top_n })
        }
        "explicit_symbols" => {
            let symbols = entry
                .universe
                .symbols
                .as_ref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    id: id.clone(),
                    field: "universe.symbols",
                })?;
            Ok(StrategyKind::ExplicitSymbols {
                symbols: symbols.iter().map(|s| s.to_ascii_uppercase()).collect(),
            })
        }
        "random_n" => Ok(StrategyKind::RandomN {
            n: require_n(entry.universe.n, "universe.n")?,
        }),
        "top_n_ranked" => Ok(StrategyKind::TopNRanked {
            n: require_n(entry.universe.n, "universe.n")?,
            metric: metric()?,
            proportional: proportional()?,
        }),
        "bottom_n_ranked" => Ok(StrategyKind::BottomNRanked {
            n: require_n(entry.universe.n, "universe.n")?,
            metric: metric()?,
        }),
        other => Err(ConfigError::UnknownPlugin {
            id: id.clone(),
            plugin: other.to_string(),
        }),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("strategy file parse error: {0}")]
    Parse(String),

    #[error("strategy file must contain a non-empty 'strategies' list")]
    EmptyStrategyList,

    #[error("end date {end} precedes start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("{message}")]
    Invalid { message: String },

    #[error("strategy '{id}': unknown plugin '{plugin}'")]
    UnknownPlugin { id: String, plugin: String },

    #[error("strategy '{id}': unknown frequency '{value}'")]
    UnknownFrequency { id: String, value: String },

    #[error("strategy '{id}': unknown rank metric '{value}'")]
    UnknownMetric { id: String, value: String },

    #[error("strategy '{id}': unknown weight scheme '{value}'")]
    UnknownWeightScheme { id: String, value: String },

    #[error("strategy '{id}': N must be positive")]
    NonPositiveN { id: String },

    #[error("strategy '{id}': missing required field '{field}'")]
    MissingField { id: String, field: &'static str },

    #[error("duplicate strategy_id '{id}'")]
    DuplicateStrategyId { id: String },

    #[error("strategy '{id}': {message}")]
    InvalidStrategy { id: String, message: String },
}

impl ConfigError {
    fn invalid(message: &str) -> Self {
        Self::Invalid {
            message: message.to_string(),
        }
    }
}
