//! Period-indexed, instrument-keyed numeric tables.
//!
//! One `Panel` type serves as price panel, factor panel and return panel.
//! Missing cells are `None`.

use crate::domain::error::EbuissError;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    periods: Vec<NaiveDate>,
    instruments: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
    period_index: HashMap<NaiveDate, usize>,
}

pub type PricePanel = Panel;
pub type FactorPanel = Panel;
pub type ReturnPanel = Panel;

impl Panel {
    /// Build a panel, checking that periods strictly increase, instruments are
    /// unique and every row spans the instrument axis.
    pub fn new(
        periods: Vec<NaiveDate>,
        instruments: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, EbuissError> {
        if periods.len() != values.len() {
            return Err(EbuissError::invalid_input(format!(
                "panel has {} periods but {} rows",
                periods.len(),
                values.len()
            )));
        }

        for pair in periods.windows(2) {
            if pair[1] <= pair[0] {
                return Err(EbuissError::invalid_input(format!(
                    "periods must be strictly increasing ({} follows {})",
                    pair[1], pair[0]
                )));
            }
        }

        let mut seen = HashSet::new();
        for id in &instruments {
            if !seen.insert(id.as_str()) {
                return Err(EbuissError::invalid_input(format!(
                    "duplicate instrument: {id}"
                )));
            }
        }

        for (period, row) in periods.iter().zip(&values) {
            if row.len() != instruments.len() {
                return Err(EbuissError::invalid_input(format!(
                    "row {} has {} values, expected {}",
                    period,
                    row.len(),
                    instruments.len()
                )));
            }
        }

        let period_index = periods.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        Ok(Self {
            periods,
            instruments,
            values,
            period_index,
        })
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn instrument_index(&self, instrument: &str) -> Option<usize> {
        self.instruments.iter().position(|id| id == instrument)
    }

    pub fn row(&self, period: NaiveDate) -> Option<&[Option<f64>]> {
        self.period_index
            .get(&period)
            .map(|&i| self.values[i].as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, &[Option<f64>])> {
        self.periods
            .iter()
            .copied()
            .zip(self.values.iter().map(|r| r.as_slice()))
    }

    pub fn value(&self, period: NaiveDate, instrument: &str) -> Option<f64> {
        let col = self.instrument_index(instrument)?;
        self.row(period).and_then(|row| row[col])
    }

    /// Log returns `ln(p[t] / p[t-1])`. The first period is dropped, as is any
    /// period where at least one instrument has no return.
    pub fn log_returns(&self) -> Result<ReturnPanel, EbuissError> {
        for (period, row) in self.rows() {
            for (id, price) in self.instruments.iter().zip(row) {
                if let Some(p) = price {
                    if !p.is_finite() || *p <= 0.0 {
                        return Err(EbuissError::invalid_input(format!(
                            "price for {id} on {period} must be positive, got {p}"
                        )));
                    }
                }
            }
        }

        let mut periods = Vec::new();
        let mut values = Vec::new();
        for t in 1..self.values.len() {
            let prev = &self.values[t - 1];
            let curr = &self.values[t];
            let row: Option<Vec<Option<f64>>> = prev
                .iter()
                .zip(curr)
                .map(|(p0, p1)| match (p0, p1) {
                    (Some(p0), Some(p1)) => Some(Some((p1 / p0).ln())),
                    _ => None,
                })
                .collect();
            if let Some(row) = row {
                periods.push(self.periods[t]);
                values.push(row);
            }
        }

        Panel::new(periods, self.instruments.clone(), values)
    }

    /// Keep only the listed periods that exist in this panel.
    pub fn restrict_periods(&self, periods: &[NaiveDate]) -> Panel {
        let keep: HashSet<NaiveDate> = periods.iter().copied().collect();
        let mut out_periods = Vec::new();
        let mut out_values = Vec::new();
        for (period, row) in self.rows() {
            if keep.contains(&period) {
                out_periods.push(period);
                out_values.push(row.to_vec());
            }
        }
        let period_index = out_periods
            .iter()
            .enumerate()
            .map(|(i, &d)| (d, i))
            .collect();
        Panel {
            periods: out_periods,
            instruments: self.instruments.clone(),
            values: out_values,
            period_index,
        }
    }

    /// Shift every instrument's series `lag` periods later. The first `lag`
    /// rows become missing.
    pub fn lagged(&self, lag: usize) -> Panel {
        let width = self.instruments.len();
        let values = (0..self.values.len())
            .map(|t| {
                if t >= lag {
                    self.values[t - lag].clone()
                } else {
                    vec![None; width]
                }
            })
            .collect();
        Panel {
            periods: self.periods.clone(),
            instruments: self.instruments.clone(),
            values,
            period_index: self.period_index.clone(),
        }
    }
}
