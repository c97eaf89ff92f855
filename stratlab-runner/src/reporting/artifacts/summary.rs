//! Annual and terminal summary exports.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::metrics::{AnnualSummary, TerminalSummary};

pub fn write_annual_summary_csv(path: &Path, summaries: &[AnnualSummary]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(
        out,
        "strategy_id,year,start_equity,end_equity,net_contributions_year,return_year,\
         max_drawdown_year,volatility_year"
    )?;
    for row in summaries {
        writeln!(
            out,
            "{},{},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10}",
            row.strategy_id,
            row.year,
            row.start_equity,
            row.end_equity,
            row.net_contributions_year,
            row.return_year,
            row.max_drawdown_year,
            row.volatility_year,
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_terminal_summary_csv(path: &Path, summaries: &[TerminalSummary]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(
        out,
        "strategy_id,final_equity,total_contributions,net_profit,cagr,max_drawdown,\
         annualized_volatility,sharpe_proxy,total_trades,avg_turnover"
    )?;
    for row in summaries {
        writeln!(
            out,
            "{},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10},{},{:.10}",
            row.strategy_id,
            row.final_equity,
            row.total_contributions,
            row.net_profit,
            row.cagr,
            row.max_drawdown,
            row.annualized_volatility,
            row.sharpe_proxy,
            row.total_trades,
            row.avg_turnover,
        )?;
    }
    out.flush()?;
    Ok(())
}
