#![allow(dead_code)]

use chrono::NaiveDate;
use ebuiss::domain::error::EbuissError;
use ebuiss::domain::panel::{FactorPanel, Panel, PricePanel};
use ebuiss::domain::position::PositionMatrix;
use ebuiss::domain::strategy::{Strategy, StrategyInfo};
use ebuiss::ports::panel_port::PanelPort;
use ebuiss::ports::report_port::{ReportContext, ReportPort};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Weekly dates starting 2024-01-01.
pub fn weeks(n: usize) -> Vec<NaiveDate> {
    let start = date("2024-01-01");
    (0..n)
        .map(|i| start + chrono::Duration::weeks(i as i64))
        .collect()
}

pub fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Panel on weekly dates from dense rows.
pub fn make_panel(instruments: &[&str], rows: &[&[f64]]) -> Panel {
    Panel::new(
        weeks(rows.len()),
        ids(instruments),
        rows.iter()
            .map(|r| r.iter().map(|&v| Some(v)).collect())
            .collect(),
    )
    .unwrap()
}

/// Replays fixed position labels for each price period.
pub struct FixedStrategy {
    info: StrategyInfo,
    instruments: Vec<String>,
    labels: Vec<Vec<i64>>,
}

impl FixedStrategy {
    pub fn new(instruments: &[&str], labels: Vec<Vec<i64>>) -> Self {
        Self {
            info: StrategyInfo {
                name: "Fixed".to_string(),
                description: "replays fixed labels".to_string(),
                parameters: BTreeMap::new(),
            },
            instruments: ids(instruments),
            labels,
        }
    }
}

impl Strategy for FixedStrategy {
    fn info(&self) -> &StrategyInfo {
        &self.info
    }

    fn generate_positions(
        &self,
        prices: &PricePanel,
        _factors: Option<&FactorPanel>,
    ) -> Result<PositionMatrix, EbuissError> {
        let mut matrix = PositionMatrix::new(self.instruments.clone());
        for (period, labels) in prices.periods().iter().zip(&self.labels) {
            matrix.push_values(*period, labels)?;
        }
        Ok(matrix)
    }
}

pub struct MockPanelPort {
    pub prices: PricePanel,
    pub factors: BTreeMap<String, FactorPanel>,
}

impl MockPanelPort {
    pub fn new(prices: PricePanel) -> Self {
        Self {
            prices,
            factors: BTreeMap::new(),
        }
    }

    pub fn with_factor(mut self, name: &str, panel: FactorPanel) -> Self {
        self.factors.insert(name.to_string(), panel);
        self
    }
}

impl PanelPort for MockPanelPort {
    fn load_prices(
        &self,
        _start_date: Option<NaiveDate>,
        _end_date: Option<NaiveDate>,
    ) -> Result<PricePanel, EbuissError> {
        Ok(self.prices.clone())
    }

    fn load_factors(
        &self,
        factor: &str,
        _start_date: Option<NaiveDate>,
        _end_date: Option<NaiveDate>,
    ) -> Result<FactorPanel, EbuissError> {
        self.factors
            .get(factor)
            .cloned()
            .ok_or_else(|| EbuissError::Data {
                reason: format!("no factor {factor}"),
            })
    }
}

/// Records what a report writer was handed.
pub struct MockReportPort {
    pub calls: RefCell<Vec<(String, usize, usize, usize, PathBuf)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write(&self, report: &ReportContext<'_>, output_dir: &Path) -> Result<(), EbuissError> {
        self.calls.borrow_mut().push((
            report.summary.strategy.clone(),
            report.trade_log.len(),
            report.equity_curve.len(),
            report.metrics.len(),
            output_dir.to_path_buf(),
        ));
        Ok(())
    }
}
