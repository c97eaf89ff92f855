//! Single-pass streaming snapshot source.
//!
//! Reads the date-grouped input CSV once, yielding one `MarketSnapshot`
//! per trading date in strictly ascending order. Memory stays
//! proportional to the number of active symbols: one bar per symbol for
//! the date being assembled, plus the per-symbol rolling windows.
//! The source is single-consumer and non-restartable.

use crate::data::reconstruct::AdjustmentTable;
use crate::data::rolling::RollingDollarVolume;
use crate::data::schema::{ColumnIndex, DataError, ParsedRow};
use crate::domain::MarketSnapshot;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default rolling feature window (trading days).
pub const DEFAULT_ROLLING_WINDOW: usize = 252;

#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// When set, only these symbols are kept (upper-cased).
    pub symbols: Option<BTreeSet<String>>,
    pub min_price: f64,
    pub max_price: f64,
    pub min_volume: f64,
    pub rolling_window: usize,
}

impl StreamOptions {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            symbols: None,
            min_price: 0.01,
            max_price: 100_000.0,
            min_volume: 0.0,
            rolling_window: DEFAULT_ROLLING_WINDOW,
        }
    }
}

/// Row accounting surfaced in the run manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Data rows read (header excluded).
    pub rows_read: u64,
    /// Valid bars that made it into a snapshot.
    pub bars_used: u64,
    /// Invalid bars dropped (missing/non-positive close, empty price or
    /// volume cells).
    pub bars_dropped: u64,
    /// Bars excluded by the symbol/price/volume filters.
    pub bars_filtered: u64,
}

pub struct SnapshotReader<R: Read> {
    reader: csv::Reader<R>,
    columns: ColumnIndex,
    opts: StreamOptions,
    adjustments: AdjustmentTable,
    rolling: RollingDollarVolume,
    current: Option<MarketSnapshot>,
    record: csv::StringRecord,
    stats: ReaderStats,
    done: bool,
}

impl<R: Read> std::fmt::Debug for SnapshotReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader")
            .field("columns", &self.columns)
            .field("opts", &self.opts)
            .field("current", &self.current)
            .field("stats", &self.stats)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl SnapshotReader<File> {
    pub fn open(path: &Path, opts: StreamOptions) -> Result<Self, DataError> {
        Self::open_adjusted(path, opts, AdjustmentTable::identity())
    }

    /// Open with a precomputed price-reconstruction table
    /// (`raw_reconstructed` mode).
    pub fn open_adjusted(
        path: &Path,
        opts: StreamOptions,
        adjustments: AdjustmentTable,
    ) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        Self::from_csv(reader, opts, adjustments)
    }
}

impl<R: Read> SnapshotReader<R> {
    pub fn from_reader(raw: R, opts: StreamOptions) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(raw);
        Self::from_csv(reader, opts, AdjustmentTable::identity())
    }

    fn from_csv(
        mut reader: csv::Reader<R>,
        opts: StreamOptions,
        adjustments: AdjustmentTable,
    ) -> Result<Self, DataError> {
        let headers = reader.headers().map_err(|_| DataError::MissingHeader)?;
        if headers.is_empty() {
            return Err(DataError::MissingHeader);
        }
        let columns = ColumnIndex::from_headers(headers)?;
        let rolling = RollingDollarVolume::new(opts.rolling_window.max(1));
        Ok(Self {
            reader,
            columns,
            opts,
            adjustments,
            rolling,
            current: None,
            record: csv::StringRecord::new(),
            stats: ReaderStats::default(),
            done: false,
        })
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Pull the snapshot being assembled, stamping rolling features.
    fn finalize(&mut self) -> Option<MarketSnapshot> {
        let mut snapshot = self.current.take()?;
        if snapshot.is_empty() {
            return None;
        }
        let dollar_volumes: Vec<(String, f64)> = snapshot
            .bars()
            .map(|(symbol, bar)| (symbol.to_string(), bar.dollar_volume()))
            .collect();
        for (symbol, dv) in &dollar_volumes {
            self.rolling.update(symbol, *dv);
        }
        for (symbol, _) in &dollar_volumes {
            if let Some(sum) = self.rolling.full_sum(symbol) {
                snapshot.set_rolling_dollar_volume(symbol, sum);
            }
        }
        Some(snapshot)
    }

    fn stash(&mut self, date: NaiveDate, parsed: ParsedRow) {
        let mut bar = match parsed {
            ParsedRow::Dropped => {
                self.stats.bars_dropped += 1;
                tracing::debug!(date = %date, "dropped invalid bar");
                return;
            }
            ParsedRow::Bar(bar) => bar,
        };
        if let Some(filter) = &self.opts.symbols {
            if !filter.contains(&bar.symbol) {
                self.stats.bars_filtered += 1;
                return;
            }
        }
        let factor = self.adjustments.factor(&bar.symbol, date);
        if factor != 1.0 {
            bar.open *= factor;
            bar.high *= factor;
            bar.low *= factor;
            bar.close *= factor;
        }
        if bar.close < self.opts.min_price
            || bar.close > self.opts.max_price
            || (bar.volume as f64) < self.opts.min_volume
        {
            self.stats.bars_filtered += 1;
            return;
        }
        self.stats.bars_used += 1;
        if let Some(current) = &mut self.current {
            current.insert(bar);
        }
    }

    fn fail(&mut self, err: DataError) -> Option<Result<MarketSnapshot, DataError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for SnapshotReader<R> {
    type Item = Result<MarketSnapshot, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read_record(&mut self.record) {
                Err(e) => return self.fail(e.into()),
                Ok(false) => {
                    self.done = true;
                    return self.finalize().map(Ok);
                }
                Ok(true) => {}
            }
            let line = self.record.position().map_or(0, |p| p.line());
            self.stats.rows_read += 1;
            let record = self.record.clone();
            let (date, parsed) =
                match crate::data::schema::parse_row(&record, &self.columns, line) {
                    Ok(row) => row,
                    Err(e) => return self.fail(e),
                };
            if date < self.opts.start_date || date > self.opts.end_date {
                continue;
            }
            let building = self.current.as_ref().map(|snap| snap.date);
            match building {
                None => {
                    self.current = Some(MarketSnapshot::new(date));
                    self.stash(date, parsed);
                }
                Some(current) if date == current => {
                    self.stash(date, parsed);
                }
                Some(current) if date < current => {
                    return self.fail(DataError::OutOfOrder {
                        line,
                        date,
                        previous: current,
                    });
                }
                Some(_) => {
                    let finished = self.finalize();
                    self.current = Some(MarketSnapshot::new(date));
                    self.stash(date, parsed);
                    if let Some(snapshot) = finished {
                        return Some(Ok(snapshot));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(start: (i32, u32, u32), end: (i32, u32, u32)) -> StreamOptions {
        StreamOptions::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
    }

    fn read_all(csv_text: &str, opts: StreamOptions) -> (Vec<MarketSnapshot>, ReaderStats) {
        let mut reader = SnapshotReader::from_reader(csv_text.as_bytes(), opts).unwrap();
        let mut snapshots = Vec::new();
        for item in &mut reader {
            snapshots.push(item.unwrap());
        }
        let stats = reader.stats();
        (snapshots, stats)
    }

    const HEADER: &str = "Date,Ticker,Open,High,Low,Close,Volume,Dividends,Stock Splits\n";

    #[test]
    fn groups_rows_by_date_in_order() {
        let text = format!(
            "{HEADER}\
             2020-01-02,AAA,1,1,1,1,100,0,0\n\
             2020-01-02,BBB,2,2,2,2,100,0,0\n\
             2020-01-03,AAA,1,1,1,1,100,0,0\n"
        );
        let (snaps, stats) = read_all(&text, opts((2020, 1, 1), (2020, 12, 31)));
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].len(), 2);
        assert_eq!(snaps[1].len(), 1);
        assert!(snaps[0].date < snaps[1].date);
        assert_eq!(stats.rows_read, 3);
        assert_eq!(stats.bars_used, 3);
    }

    #[test]
    fn invalid_bars_are_dropped_and_counted() {
        let text = format!(
            "{HEADER}\
             2020-01-02,AAA,1,1,1,1,100,0,0\n\
             2020-01-02,BBB,2,2,2,0,100,0,0\n\
             2020-01-02,CCC,2,2,2,,100,0,0\n"
        );
        let (snaps, stats) = read_all(&text, opts((2020, 1, 1), (2020, 12, 31)));
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].len(), 1);
        assert_eq!(stats.bars_dropped, 2);
    }

    #[test]
    fn all_invalid_date_yields_no_snapshot() {
        let text = format!(
            "{HEADER}\
             2020-01-02,AAA,1,1,1,0,100,0,0\n\
             2020-01-03,AAA,1,1,1,1,100,0,0\n"
        );
        let (snaps, _) = read_all(&text, opts((2020, 1, 1), (2020, 12, 31)));
        assert_eq!(snaps.len(), 1);
        assert_eq!(
            snaps[0].date,
            NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()
        );
    }

    #[test]
    fn date_range_filters_rows() {
        let text = format!(
            "{HEADER}\
             2019-12-31,AAA,1,1,1,1,100,0,0\n\
             2020-01-02,AAA,1,1,1,1,100,0,0\n\
             2021-01-04,AAA,1,1,1,1,100,0,0\n"
        );
        let (snaps, stats) = read_all(&text, opts((2020, 1, 1), (2020, 12, 31)));
        assert_eq!(snaps.len(), 1);
        assert_eq!(stats.rows_read, 3);
        assert_eq!(stats.bars_used, 1);
    }

    #[test]
    fn out_of_order_date_is_an_error() {
        let text = format!(
            "{HEADER}\
             2020-01-03,AAA,1,1,1,1,100,0,0\n\
             2020-01-02,AAA,1,1,1,1,100,0,0\n"
        );
        let mut reader =
            SnapshotReader::from_reader(text.as_bytes(), opts((2020, 1, 1), (2020, 12, 31)))
                .unwrap();
        let result: Vec<_> = (&mut reader).collect();
        assert!(result
            .iter()
            .any(|r| matches!(r, Err(DataError::OutOfOrder { .. }))));
    }

    #[test]
    fn missing_column_fails_at_open() {
        let text = "Date,Ticker,Close\n2020-01-02,AAA,1\n";
        let err =
            SnapshotReader::from_reader(text.as_bytes(), opts((2020, 1, 1), (2020, 12, 31)))
                .unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }

    #[test]
    fn min_volume_filter_applies() {
        let text = format!(
            "{HEADER}\
             2020-01-02,AAA,1,1,1,1,100,0,0\n\
             2020-01-02,BBB,1,1,1,1,5,0,0\n"
        );
        let mut options = opts((2020, 1, 1), (2020, 12, 31));
        options.min_volume = 50.0;
        let (snaps, stats) = read_all(&text, options);
        assert_eq!(snaps[0].len(), 1);
        assert_eq!(stats.bars_filtered, 1);
    }

    #[test]
    fn symbol_filter_applies() {
        let text = format!(
            "{HEADER}\
             2020-01-02,AAA,1,1,1,1,100,0,0\n\
             2020-01-02,BBB,1,1,1,1,100,0,0\n"
        );
        let mut options = opts((2020, 1, 1), (2020, 12, 31));
        options.symbols = Some(["AAA".to_string()].into_iter().collect());
        let (snaps, _) = read_all(&text, options);
        assert_eq!(snaps[0].symbols().collect::<Vec<_>>(), vec!["AAA"]);
    }

    #[test]
    fn rolling_feature_appears_after_full_window() {
        let mut options = opts((2020, 1, 1), (2020, 12, 31));
        options.rolling_window = 3;
        let mut text = HEADER.to_string();
        for day in 2..=6 {
            text.push_str(&format!("2020-01-{day:02},AAA,10,10,10,10,100,0,0\n"));
        }
        let (snaps, _) = read_all(&text, options);
        assert_eq!(snaps.len(), 5);
        assert_eq!(snaps[0].rolling_dollar_volume("AAA"), None);
        assert_eq!(snaps[1].rolling_dollar_volume("AAA"), None);
        // Window full on the third observation: 3 * 10 * 100.
        assert_eq!(snaps[2].rolling_dollar_volume("AAA"), Some(3_000.0));
        assert_eq!(snaps[4].rolling_dollar_volume("AAA"), Some(3_000.0));
    }
}
