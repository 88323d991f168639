//! CSV report adapter implementing ReportPort.
//!
//! Writes `trade_log.csv`, `equity.csv`, `metrics.csv` and `segments.csv`
//! into an output directory. Undefined values are written as empty cells.

use crate::domain::error::EbuissError;
use crate::domain::evaluator::{Segment, segment_cumulative};
use crate::ports::report_port::{ReportContext, ReportPort};
use std::fs;
use std::path::Path;

pub struct CsvReportAdapter;

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_err(path: &Path, e: impl std::fmt::Display) -> EbuissError {
    EbuissError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_rows(path: &Path, header: &[&str], rows: Vec<Vec<String>>) -> Result<(), EbuissError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    wtr.write_record(header).map_err(|e| csv_err(path, e))?;
    for row in rows {
        wtr.write_record(&row).map_err(|e| csv_err(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &ReportContext<'_>, output_dir: &Path) -> Result<(), EbuissError> {
        fs::create_dir_all(output_dir)?;

        let trade_rows: Vec<Vec<String>> = report
            .trade_log
            .iter()
            .map(|e| {
                vec![
                    e.period.to_string(),
                    e.cash.to_string(),
                    opt(e.buy_ret),
                    opt(e.sell_ret),
                    opt(e.neutral_ret),
                    e.long_short_ret.to_string(),
                    e.cost.to_string(),
                ]
            })
            .collect();
        write_rows(
            &output_dir.join("trade_log.csv"),
            &[
                "period",
                "cash",
                "buy_ret",
                "sell_ret",
                "neutral_ret",
                "long_short_ret",
                "cost",
            ],
            trade_rows,
        )?;

        let equity_rows: Vec<Vec<String>> = report
            .equity_curve
            .iter()
            .map(|p| vec![p.period.to_string(), p.cash.to_string()])
            .collect();
        write_rows(&output_dir.join("equity.csv"), &["period", "cash"], equity_rows)?;

        let metric_rows: Vec<Vec<String>> = report
            .metrics
            .iter()
            .map(|(segment, m)| {
                vec![
                    segment.name().to_string(),
                    m.cumulative_return.to_string(),
                    m.annualized_return.to_string(),
                    opt(m.annualized_volatility),
                    opt(m.return_to_risk),
                    m.win_rate.to_string(),
                    m.max_drawdown.to_string(),
                    opt(m.calmar_ratio),
                ]
            })
            .collect();
        write_rows(
            &output_dir.join("metrics.csv"),
            &[
                "segment",
                "cumulative_return",
                "annualized_return",
                "annualized_volatility",
                "return_to_risk",
                "win_rate",
                "max_drawdown",
                "calmar_ratio",
            ],
            metric_rows,
        )?;

        let mut segment_header = vec!["period"];
        segment_header.extend(Segment::ALL.iter().map(|s| s.name()));
        let segment_rows: Vec<Vec<String>> = segment_cumulative(report.trade_log)
            .into_iter()
            .map(|(period, totals)| {
                std::iter::once(period.to_string())
                    .chain(totals.iter().map(|t| t.to_string()))
                    .collect()
            })
            .collect();
        write_rows(&output_dir.join("segments.csv"), &segment_header, segment_rows)?;

        tracing::info!(
            strategy = %report.summary.strategy,
            dir = %output_dir.display(),
            "report written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evaluator::Evaluator;
    use crate::domain::simulator::{EquityPoint, Summary, TradeLogEntry};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_log() -> Vec<TradeLogEntry> {
        vec![
            TradeLogEntry {
                period: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                cash: 1_010_000.0,
                buy_ret: Some(0.02),
                sell_ret: Some(0.01),
                neutral_ret: None,
                long_short_ret: 0.01,
                cost: 0.0,
            },
            TradeLogEntry {
                period: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                cash: 1_000_000.0,
                buy_ret: Some(-0.01),
                sell_ret: None,
                neutral_ret: Some(0.003),
                long_short_ret: 0.0,
                cost: 10_100.0,
            },
        ]
    }

    #[test]
    fn writes_all_report_files() {
        let dir = TempDir::new().unwrap();
        let log = sample_log();
        let metrics = Evaluator::new(&log, "Test").evaluate().unwrap();
        let summary = Summary {
            strategy: "Test".into(),
            total_return: 0.0,
            annualized_return: 0.0,
            final_equity: 1_000_000.0,
        };
        let equity: Vec<EquityPoint> = log
            .iter()
            .map(|e| EquityPoint {
                period: e.period,
                cash: e.cash,
            })
            .collect();
        let ctx = ReportContext {
            summary: &summary,
            trade_log: &log,
            equity_curve: &equity,
            metrics: &metrics,
        };

        let out = dir.path().join("report");
        CsvReportAdapter.write(&ctx, &out).unwrap();

        let trade_log = fs::read_to_string(out.join("trade_log.csv")).unwrap();
        let mut lines = trade_log.lines();
        assert_eq!(
            lines.next().unwrap(),
            "period,cash,buy_ret,sell_ret,neutral_ret,long_short_ret,cost"
        );
        assert_eq!(lines.next().unwrap(), "2024-01-08,1010000,0.02,0.01,,0.01,0");

        let metrics_csv = fs::read_to_string(out.join("metrics.csv")).unwrap();
        assert_eq!(metrics_csv.lines().count(), 5);
        assert!(metrics_csv.lines().nth(4).unwrap().starts_with("long_short,"));

        let segments = fs::read_to_string(out.join("segments.csv")).unwrap();
        assert_eq!(
            segments.lines().next().unwrap(),
            "period,buy,sell,neutral,long_short"
        );

        let equity = fs::read_to_string(out.join("equity.csv")).unwrap();
        assert_eq!(equity.lines().count(), 3);
        assert_eq!(equity.lines().nth(2).unwrap(), "2024-01-15,1000000");
    }

    #[test]
    fn equity_file_follows_the_equity_curve() {
        let dir = TempDir::new().unwrap();
        let log = sample_log();
        let metrics = Evaluator::new(&log, "Test").evaluate().unwrap();
        let summary = Summary {
            strategy: "Test".into(),
            total_return: 0.0,
            annualized_return: 0.0,
            final_equity: 1_000_000.0,
        };
        // a curve with one point only; the trade log still has two rows
        let equity = vec![EquityPoint {
            period: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            cash: 999.5,
        }];
        let ctx = ReportContext {
            summary: &summary,
            trade_log: &log,
            equity_curve: &equity,
            metrics: &metrics,
        };

        CsvReportAdapter.write(&ctx, dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("equity.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["period,cash", "2024-01-15,999.5"]);
    }
}
