//! Input CSV schema: required columns, header mapping, and row parsing.
//!
//! A bar is valid iff its close parses and is positive. Missing (empty)
//! price or volume cells drop the bar with a counted warning; a non-empty
//! cell that fails to parse is a hard data error carrying the line number.
//! Empty `Dividends` / `Stock Splits` cells default to 0 and 1.

use crate::domain::Bar;
use chrono::NaiveDate;
use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 9] = [
    "Date",
    "Ticker",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Dividends",
    "Stock Splits",
];

/// Positions of the required columns in the input header.
/// Unknown extra columns are ignored.
#[derive(Debug, Clone, Copy)]
pub struct ColumnIndex {
    pub date: usize,
    pub ticker: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: usize,
    pub dividends: usize,
    pub splits: usize,
}

impl ColumnIndex {
    pub fn from_headers(headers: &csv::StringRecord) -> Result<Self, DataError> {
        let find = |name: &'static str| -> Result<usize, DataError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(DataError::MissingColumn { column: name })
        };
        Ok(Self {
            date: find("Date")?,
            ticker: find("Ticker")?,
            open: find("Open")?,
            high: find("High")?,
            low: find("Low")?,
            close: find("Close")?,
            volume: find("Volume")?,
            dividends: find("Dividends")?,
            splits: find("Stock Splits")?,
        })
    }
}

/// A parsed row: either a usable bar or a counted drop reason.
#[derive(Debug)]
pub enum ParsedRow {
    Bar(Bar),
    /// Close missing/non-positive, or a required price/volume cell empty.
    Dropped,
}

pub fn parse_row(
    record: &csv::StringRecord,
    columns: &ColumnIndex,
    line: u64,
) -> Result<(NaiveDate, ParsedRow), DataError> {
    let raw_date = record.get(columns.date).unwrap_or("");
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
        DataError::InvalidDate {
            line,
            value: raw_date.to_string(),
        }
    })?;

    let close = match parse_optional(record, columns.close, "Close", line)? {
        Some(v) => v,
        None => return Ok((date, ParsedRow::Dropped)),
    };
    if close <= 0.0 {
        return Ok((date, ParsedRow::Dropped));
    }
    let open = parse_optional(record, columns.open, "Open", line)?;
    let high = parse_optional(record, columns.high, "High", line)?;
    let low = parse_optional(record, columns.low, "Low", line)?;
    let volume = parse_optional(record, columns.volume, "Volume", line)?;
    let (open, high, low, volume) = match (open, high, low, volume) {
        (Some(o), Some(h), Some(l), Some(v)) if v >= 0.0 => (o, h, l, v),
        _ => return Ok((date, ParsedRow::Dropped)),
    };
    let dividend =
        parse_optional(record, columns.dividends, "Dividends", line)?.unwrap_or(0.0);
    let split = match parse_optional(record, columns.splits, "Stock Splits", line)? {
        // Some sources encode "no split" as 0 instead of 1.
        Some(v) if v > 0.0 => v,
        _ => 1.0,
    };

    let symbol = record
        .get(columns.ticker)
        .unwrap_or("")
        .trim()
        .to_ascii_uppercase();
    if symbol.is_empty() {
        return Ok((date, ParsedRow::Dropped));
    }

    Ok((
        date,
        ParsedRow::Bar(Bar {
            date,
            symbol,
            open,
            high,
            low,
            close,
            volume: volume as u64,
            dividend: dividend.max(0.0),
            split,
        }),
    ))
}

fn parse_optional(
    record: &csv::StringRecord,
    index: usize,
    column: &'static str,
    line: u64,
) -> Result<Option<f64>, DataError> {
    let raw = record.get(index).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| DataError::InvalidNumber {
            line,
            column,
            value: raw.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("input CSV has no header row")]
    MissingHeader,

    #[error("missing required column: {column}")]
    MissingColumn { column: &'static str },

    #[error("line {line}: unparseable date '{value}'")]
    InvalidDate { line: u64, value: String },

    #[error("line {line}: non-numeric {column} value '{value}'")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("line {line}: date {date} out of order (previous {previous})")]
    OutOfOrder {
        line: u64,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
