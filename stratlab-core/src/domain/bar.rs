use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Single daily OHLCV bar for one (date, symbol) observation.
///
/// `dividend` is cash per share paid on this date; `split` is the split
/// ratio in effect (1.0 when none).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub dividend: f64,
    pub split: f64,
}

impl Bar {
    /// Validate bar invariants: positive close, `low <= open,close <= high`,
    /// non-negative dividend, positive split ratio.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.close <= 0.0 || !self.close.is_finite() {
            return Err(BarError::NonPositiveClose { close: self.close });
        }
        if self.high < self.low {
            return Err(BarError::InvalidRange {
                high: self.high,
                low: self.low,
            });
        }
        if !(self.low..=self.high).contains(&self.open)
            || !(self.low..=self.high).contains(&self.close)
        {
            return Err(BarError::PriceOutOfRange);
        }
        if self.dividend < 0.0 {
            return Err(BarError::NegativeDividend);
        }
        if self.split <= 0.0 {
            return Err(BarError::NonPositiveSplit);
        }
        Ok(())
    }

    /// Notional liquidity proxy: `close * volume`.
    pub fn dollar_volume(&self) -> f64 {
        self.close * self.volume as f64
    }
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("close must be positive, got {close}")]
    NonPositiveClose { close: f64 },

    #[error("invalid bar range: high={high}, low={low}")]
    InvalidRange { high: f64, low: f64 },

    #[error("open/close outside high/low range")]
    PriceOutOfRange,

    #[error("negative dividend not allowed")]
    NegativeDividend,

    #[error("split ratio must be positive")]
    NonPositiveSplit,
}
