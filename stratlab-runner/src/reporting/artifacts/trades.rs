//! Trade ledger export.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use stratlab_core::domain::LedgerEntry;

/// Rows ordered by (date, strategy_id, symbol); at most one fill per
/// symbol per strategy per day, so the ordering is total.
pub fn write_trades_csv(path: &Path, ledger: &[LedgerEntry]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(
        out,
        "date,strategy_id,symbol,side,shares,price,gross_value,slippage_cost,fee_cost,\
         net_cash_impact"
    )?;

    let mut ordered: Vec<&LedgerEntry> = ledger.iter().collect();
    ordered.sort_by(|a, b| {
        (a.date, &a.strategy_id, &a.fill.symbol).cmp(&(b.date, &b.strategy_id, &b.fill.symbol))
    });
    for entry in ordered {
        let fill = &entry.fill;
        writeln!(
            out,
            "{},{},{},{},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10}",
            entry.date,
            entry.strategy_id,
            fill.symbol,
            fill.side.as_str(),
            fill.shares,
            fill.price,
            fill.gross_value,
            fill.slippage_cost,
            fill.fee_cost,
            fill.net_cash_impact,
        )?;
    }
    out.flush()?;
    Ok(())
}
