//! Report generation port trait.

use crate::domain::error::EbuissError;
use crate::domain::evaluator::MetricsTable;
use crate::domain::simulator::{EquityPoint, Summary, TradeLogEntry};
use std::path::Path;

/// Everything a report writer receives; all of it read-only.
pub struct ReportContext<'a> {
    pub summary: &'a Summary,
    pub trade_log: &'a [TradeLogEntry],
    pub equity_curve: &'a [EquityPoint],
    pub metrics: &'a MetricsTable,
}

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, report: &ReportContext<'_>, output_dir: &Path) -> Result<(), EbuissError>;
}
