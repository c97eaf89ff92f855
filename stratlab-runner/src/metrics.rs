//! Performance metrics — pure functions from daily records and the trade
//! ledger to annual and terminal summaries. No recourse to raw market
//! data.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use stratlab_core::engine::DailyRecord;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.25;

/// Per-(strategy, year) summary row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub strategy_id: String,
    pub year: i32,
    pub start_equity: f64,
    pub end_equity: f64,
    pub net_contributions_year: f64,
    pub return_year: f64,
    pub max_drawdown_year: f64,
    pub volatility_year: f64,
}

/// Whole-run summary row for one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub strategy_id: String,
    pub final_equity: f64,
    pub total_contributions: f64,
    pub net_profit: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    pub sharpe_proxy: f64,
    pub total_trades: u64,
    pub avg_turnover: f64,
}

/// Annual summaries for one strategy's date-ascending records.
///
/// `start_equity` is the equity on the last day of the prior year, or
/// the initial capital for the first year. The yearly return is the
/// time-weighted product of contribution-adjusted daily returns.
pub fn annual_summaries(
    strategy_id: &str,
    records: &[DailyRecord],
    initial_capital: f64,
) -> Vec<AnnualSummary> {
    let mut summaries = Vec::new();
    if records.is_empty() {
        return summaries;
    }
    let mut start_equity = initial_capital;
    let mut prior_contributions = 0.0;
    let mut year_rows: Vec<&DailyRecord> = Vec::new();
    let mut current_year = records[0].date.year();

    let flush = |year: i32,
                 rows: &[&DailyRecord],
                 start_equity: f64,
                 prior_contributions: f64,
                 out: &mut Vec<AnnualSummary>| {
        let Some(last) = rows.last() else { return };
        let returns: Vec<f64> = rows
            .iter()
            .map(|r| r.daily_return)
            .filter(|r| r.is_finite())
            .collect();
        out.push(AnnualSummary {
            strategy_id: strategy_id.to_string(),
            year,
            start_equity,
            end_equity: last.total_equity,
            net_contributions_year: last.contribution_cumulative - prior_contributions,
            return_year: compound_return(&returns),
            max_drawdown_year: max_drawdown(rows.iter().map(|r| r.total_equity)),
            volatility_year: annualized_volatility(&returns),
        });
    };

    for record in records {
        if record.date.year() != current_year {
            flush(
                current_year,
                &year_rows,
                start_equity,
                prior_contributions,
                &mut summaries,
            );
            if let Some(last) = year_rows.last() {
                start_equity = last.total_equity;
                prior_contributions = last.contribution_cumulative;
            }
            year_rows.clear();
            current_year = record.date.year();
        }
        year_rows.push(record);
    }
    flush(
        current_year,
        &year_rows,
        start_equity,
        prior_contributions,
        &mut summaries,
    );
    summaries
}

/// Terminal metrics for one strategy. Returns `None` for an empty run.
pub fn terminal_summary(
    strategy_id: &str,
    records: &[DailyRecord],
    total_trades: u64,
    initial_capital: f64,
) -> Option<TerminalSummary> {
    let first = records.first()?;
    let last = records.last()?;
    let total_contributions = last.contribution_cumulative;
    let final_equity = last.total_equity;
    let net_profit = final_equity - initial_capital - total_contributions;

    let returns: Vec<f64> = records
        .iter()
        .map(|r| r.daily_return)
        .filter(|r| r.is_finite())
        .collect();
    let volatility = annualized_volatility(&returns);
    let avg_turnover = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.turnover_day).sum::<f64>() / records.len() as f64
    };

    Some(TerminalSummary {
        strategy_id: strategy_id.to_string(),
        final_equity,
        total_contributions,
        net_profit,
        cagr: cagr(
            first.date,
            last.date,
            initial_capital + total_contributions,
            final_equity,
        ),
        max_drawdown: max_drawdown(records.iter().map(|r| r.total_equity)),
        annualized_volatility: volatility,
        sharpe_proxy: sharpe_proxy(&returns),
        total_trades,
        avg_turnover,
    })
}

// ─── Metric primitives ───────────────────────────────────────────────

/// Time-weighted compound return: `prod(1 + r) - 1`.
pub fn compound_return(daily_returns: &[f64]) -> f64 {
    daily_returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Maximum peak-to-trough drawdown as a non-positive fraction.
pub fn max_drawdown(equities: impl Iterator<Item = f64>) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for equity in equities {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            max_dd = max_dd.min(equity / peak - 1.0);
        }
    }
    max_dd
}

/// Population standard deviation of daily returns, annualized by √252.
pub fn annualized_volatility(daily_returns: &[f64]) -> f64 {
    if daily_returns.len() <= 1 {
        return 0.0;
    }
    population_std(daily_returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// `mean(daily) / std(daily) * sqrt(252)` with rf = 0. Zero when the
/// return stream is degenerate.
pub fn sharpe_proxy(daily_returns: &[f64]) -> f64 {
    if daily_returns.len() <= 1 {
        return 0.0;
    }
    let std = population_std(daily_returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean(daily_returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Compound annual growth rate of `end_value` over `total_invested`,
/// using calendar years between the first and last record dates.
pub fn cagr(
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
    total_invested: f64,
    end_value: f64,
) -> f64 {
    if total_invested <= 0.0 || end_value <= 0.0 {
        return 0.0;
    }
    let days = (end_date - start_date).num_days();
    if days <= 0 {
        return 0.0;
    }
    let years = days as f64 / CALENDAR_DAYS_PER_YEAR;
    (end_value / total_invested).powf(1.0 / years) - 1.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(date: NaiveDate, equity: f64, ret: f64, contrib: f64, turnover: f64) -> DailyRecord {
        DailyRecord {
            date,
            strategy_id: "test".into(),
            cash: 0.0,
            positions_market_value: equity,
            total_equity: equity,
            daily_return: ret,
            cumulative_return: 0.0,
            contribution_cumulative: contrib,
            trade_count_day: 0,
            turnover_day: turnover,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn max_drawdown_known_path() {
        let dd = max_drawdown([100.0, 110.0, 90.0, 95.0].into_iter());
        let expected = 90.0 / 110.0 - 1.0;
        assert!((dd - expected).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotone_is_zero() {
        assert_eq!(max_drawdown([1.0, 2.0, 3.0].into_iter()), 0.0);
    }

    #[test]
    fn compound_return_basic() {
        let r = compound_return(&[0.1, -0.05]);
        assert!((r - (1.1 * 0.95 - 1.0)).abs() < 1e-12);
        assert_eq!(compound_return(&[]), 0.0);
    }

    #[test]
    fn volatility_of_constant_returns_is_zero() {
        assert_eq!(annualized_volatility(&[0.01, 0.01, 0.01]), 0.0);
        assert_eq!(sharpe_proxy(&[0.01, 0.01, 0.01]), 0.0);
    }

    #[test]
    fn sharpe_positive_for_positive_drift() {
        let returns = vec![0.01, 0.002, 0.015, 0.001, 0.012];
        assert!(sharpe_proxy(&returns) > 0.0);
    }

    #[test]
    fn cagr_one_year_double() {
        let c = cagr(date(2020, 1, 1), date(2021, 1, 1), 100.0, 200.0);
        // One year (366 days / 365.25), so roughly a doubling rate.
        assert!((c - 1.0).abs() < 0.01, "got {c}");
    }

    #[test]
    fn cagr_degenerate_inputs() {
        assert_eq!(cagr(date(2020, 1, 1), date(2020, 1, 1), 100.0, 200.0), 0.0);
        assert_eq!(cagr(date(2020, 1, 1), date(2021, 1, 1), 0.0, 200.0), 0.0);
    }

    #[test]
    fn annual_summaries_split_years() {
        let records = vec![
            record(date(2020, 6, 1), 10_000.0, 0.0, 0.0, 0.0),
            record(date(2020, 12, 31), 11_000.0, 0.1, 0.0, 0.0),
            record(date(2021, 1, 4), 11_550.0, 0.05, 100.0, 0.0),
            record(date(2021, 12, 30), 12_000.0, 0.0, 100.0, 0.0),
        ];
        let summaries = annual_summaries("test", &records, 10_000.0);
        assert_eq!(summaries.len(), 2);

        let y2020 = &summaries[0];
        assert_eq!(y2020.year, 2020);
        assert_eq!(y2020.start_equity, 10_000.0);
        assert_eq!(y2020.end_equity, 11_000.0);
        assert_eq!(y2020.net_contributions_year, 0.0);
        assert!((y2020.return_year - 0.1).abs() < 1e-12);

        let y2021 = &summaries[1];
        assert_eq!(y2021.year, 2021);
        // Prior-year close seeds the new year.
        assert_eq!(y2021.start_equity, 11_000.0);
        assert_eq!(y2021.net_contributions_year, 100.0);
        assert!((y2021.return_year - 0.05).abs() < 1e-12);
    }

    #[test]
    fn terminal_summary_composes() {
        let records = vec![
            record(date(2020, 1, 2), 10_000.0, 0.0, 0.0, 0.0),
            record(date(2020, 7, 1), 10_500.0, 0.05, 500.0, 0.2),
            record(date(2020, 12, 31), 11_000.0, 0.01, 500.0, 0.1),
        ];
        let summary = terminal_summary("test", &records, 7, 10_000.0).unwrap();
        assert_eq!(summary.final_equity, 11_000.0);
        assert_eq!(summary.total_contributions, 500.0);
        assert_eq!(summary.net_profit, 500.0);
        assert_eq!(summary.total_trades, 7);
        assert!((summary.avg_turnover - 0.1).abs() < 1e-12);
        assert!(summary.cagr > 0.0);
    }

    #[test]
    fn terminal_summary_empty_is_none() {
        assert!(terminal_summary("test", &[], 0, 10_000.0).is_none());
    }

    #[test]
    fn nan_returns_are_excluded() {
        let records = vec![
            record(date(2020, 1, 2), 0.0, 0.0, 0.0, 0.0),
            record(date(2020, 1, 3), 100.0, f64::NAN, 100.0, 0.0),
            record(date(2020, 1, 6), 101.0, 0.01, 100.0, 0.0),
        ];
        let summary = terminal_summary("test", &records, 0, 0.0).unwrap();
        assert!(summary.annualized_volatility.is_finite());
        assert!(summary.sharpe_proxy.is_finite());
    }
}
