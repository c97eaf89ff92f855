//! Daily equity curve export.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use stratlab_core::engine::DailyRecord;

/// Rows are grouped by strategy_id (ascending), dates ascending within a
/// strategy.
pub fn write_daily_equity_csv(
    path: &Path,
    records_by_strategy: &[(String, Vec<DailyRecord>)],
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(
        out,
        "date,strategy_id,cash,positions_market_value,total_equity,daily_return,\
         cumulative_return,contribution_cumulative,trade_count_day,turnover_day"
    )?;

    let mut ordered: Vec<&(String, Vec<DailyRecord>)> = records_by_strategy.iter().collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    for (strategy_id, records) in ordered {
        for record in records {
            writeln!(
                out,
                "{},{},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10},{},{:.10}",
                record.date,
                strategy_id,
                record.cash,
                record.positions_market_value,
                record.total_equity,
                record.daily_return,
                record.cumulative_return,
                record.contribution_cumulative,
                record.trade_count_day,
                record.turnover_day,
            )?;
        }
    }
    out.flush()?;
    Ok(())
}
