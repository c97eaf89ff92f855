//! Contribution and rebalance cadence.
//!
//! Decisions are made from the last fired date and the current trading
//! date. On a trading calendar, "fire when the (year, month) changes"
//! is exactly "first trading date on/after the first calendar day of
//! the month", and likewise for years.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionFrequency {
    None,
    Daily,
    Monthly,
    Yearly,
}

impl ContributionFrequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "daily" => Some(Self::Daily),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    Daily,
    Monthly,
    Yearly,
    Never,
}

impl RebalanceFrequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            "never" => Some(Self::Never),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        }
    }
}

/// Whether a contribution fires on `today`. `none` never fires; every
/// other frequency fires on the first trading day of the run.
pub fn contribution_due(
    last: Option<NaiveDate>,
    today: NaiveDate,
    frequency: ContributionFrequency,
) -> bool {
    if frequency == ContributionFrequency::None {
        return false;
    }
    let Some(last) = last else {
        return true;
    };
    if today <= last {
        return false;
    }
    match frequency {
        ContributionFrequency::None => false,
        ContributionFrequency::Daily => true,
        ContributionFrequency::Monthly => {
            today.year() != last.year() || today.month() != last.month()
        }
        ContributionFrequency::Yearly => today.year() != last.year(),
    }
}

/// Whether a rebalance fires on `today`. `never` fires exactly once, on
/// the first trading day of the run (the initial allocation).
pub fn rebalance_due(
    last: Option<NaiveDate>,
    today: NaiveDate,
    frequency: RebalanceFrequency,
) -> bool {
    let Some(last) = last else {
        return true;
    };
    if today <= last {
        return false;
    }
    match frequency {
        RebalanceFrequency::Daily => true,
        RebalanceFrequency::Monthly => {
            today.year() != last.year() || today.month() != last.month()
        }
        RebalanceFrequency::Yearly => today.year() != last.year(),
        RebalanceFrequency::Never => false,
    }
}
