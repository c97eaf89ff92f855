//! Price-series reconstruction for `raw_reconstructed` mode.
//!
//! When the input close is a total-return style series, a price-only
//! close is recovered by walking each symbol's history backwards from
//! its last observation and multiplying the observed close by the
//! cumulative `(1 - dividend/close)` factor of all later dividend
//! events. The factors are precomputed in one initial pass over the
//! file, then applied during the normal streaming pass.

use crate::data::schema::{ColumnIndex, DataError, ParsedRow};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

/// Factor applied on a date is the product over strictly later events,
/// so the last observation is always unchanged. Factors are clamped to
/// stay positive when a recorded dividend exceeds the close.
const MIN_EVENT_FACTOR: f64 = 1e-6;

/// Per-symbol dividend events with suffix-cumulative factors.
///
/// `events` is ascending by date; `cum[i]` is the product of the event
/// factors at indices `i..`. The multiplier for date `d` is `cum[j]`
/// where `j` is the first event strictly after `d`, or 1.0 if none.
#[derive(Debug, Clone, Default)]
pub struct AdjustmentTable {
    by_symbol: HashMap<String, SymbolEvents>,
}

#[derive(Debug, Clone)]
struct SymbolEvents {
    dates: Vec<NaiveDate>,
    cum: Vec<f64>,
}

impl AdjustmentTable {
    /// Identity table: every factor is 1.0.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Multiplier to convert this symbol's observed close on `date` into
    /// a price-only close.
    pub fn factor(&self, symbol: &str, date: NaiveDate) -> f64 {
        let Some(events) = self.by_symbol.get(symbol) else {
            return 1.0;
        };
        let idx = events.dates.partition_point(|&d| d <= date);
        if idx == events.dates.len() {
            1.0
        } else {
            events.cum[idx]
        }
    }

    /// Build the table in one pass over the input file. Only rows inside
    /// `[start, end]` with a positive close participate; the input must
    /// already be date-grouped ascending (the streaming pass enforces
    /// that strictly).
    pub fn build(
        path: &Path,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let columns = ColumnIndex::from_headers(reader.headers()?)?;

        // (date, factor) per dividend event, ascending per symbol.
        let mut events: HashMap<String, Vec<(NaiveDate, f64)>> = HashMap::new();
        let mut record = csv::StringRecord::new();
        while reader.read_record(&mut record)? {
            let line = record.position().map_or(0, |p| p.line());
            let (date, parsed) = match crate::data::schema::parse_row(&record, &columns, line) {
                Ok(row) => row,
                // Hard errors surface in the streaming pass with full
                // context; the factor pass only collects what it can.
                Err(DataError::InvalidDate { .. }) => continue,
                Err(e) => return Err(e),
            };
            if date < start || date > end {
                continue;
            }
            if let ParsedRow::Bar(bar) = parsed {
                if bar.dividend > 0.0 {
                    let factor = (1.0 - bar.dividend / bar.close).max(MIN_EVENT_FACTOR);
                    events.entry(bar.symbol).or_default().push((date, factor));
                }
            }
        }

        let mut by_symbol = HashMap::with_capacity(events.len());
        for (symbol, mut symbol_events) in events {
            symbol_events.sort_by_key(|(date, _)| *date);
            let dates: Vec<NaiveDate> = symbol_events.iter().map(|(d, _)| *d).collect();
            let mut cum = vec![1.0; symbol_events.len()];
            let mut running = 1.0;
            for (i, (_, factor)) in symbol_events.iter().enumerate().rev() {
                running *= factor;
                cum[i] = running;
            }
            by_symbol.insert(symbol, SymbolEvents { dates, cum });
        }
        Ok(Self { by_symbol })
    }
}
