//! CSV file panel adapter.
//!
//! Prices are read from a wide file (`date,<id1>,<id2>,...`). Factors are read
//! from a long file (`date,ticker,<factor1>,<factor2>,...`) and pivoted to a
//! wide panel for one factor column. Empty cells are missing values.

use crate::domain::error::EbuissError;
use crate::domain::panel::{FactorPanel, Panel, PricePanel};
use crate::ports::panel_port::PanelPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvPanelAdapter {
    prices_path: PathBuf,
    factors_path: Option<PathBuf>,
}

impl CsvPanelAdapter {
    pub fn new(prices_path: PathBuf, factors_path: Option<PathBuf>) -> Self {
        Self {
            prices_path,
            factors_path,
        }
    }
}

fn read_file(path: &Path) -> Result<String, EbuissError> {
    fs::read_to_string(path).map_err(|e| EbuissError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, EbuissError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| EbuissError::Data {
        reason: format!("invalid date '{}': {}", raw.trim(), e),
    })
}

fn parse_cell(raw: &str, column: &str) -> Result<Option<f64>, EbuissError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|e| EbuissError::Data {
        reason: format!("invalid value '{trimmed}' in column {column}: {e}"),
    })
}

fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

fn into_panel(
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
    instruments: Vec<String>,
) -> Result<Panel, EbuissError> {
    let (periods, values): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
    Panel::new(periods, instruments, values)
}

/// Parse a wide CSV: first column dates, one column per instrument.
pub fn parse_wide(
    content: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Panel, EbuissError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| EbuissError::Data {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();

    let instruments: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    if instruments.is_empty() {
        return Err(EbuissError::Data {
            reason: "price file has no instrument columns".into(),
        });
    }

    let mut rows = BTreeMap::new();
    for result in rdr.records() {
        let record = result.map_err(|e| EbuissError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;

        let date = parse_date(record.get(0).ok_or_else(|| EbuissError::Data {
            reason: "missing date column".into(),
        })?)?;
        if !in_range(date, start, end) {
            continue;
        }

        let values = instruments
            .iter()
            .enumerate()
            .map(|(i, id)| parse_cell(record.get(i + 1).unwrap_or(""), id))
            .collect::<Result<Vec<_>, _>>()?;

        if rows.insert(date, values).is_some() {
            return Err(EbuissError::Data {
                reason: format!("duplicate date {date} in price file"),
            });
        }
    }

    into_panel(rows, instruments)
}

/// Parse a long CSV (`date,ticker,...factors`) into a wide panel of `factor`.
pub fn parse_long(
    content: &str,
    factor: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Panel, EbuissError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| EbuissError::Data {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();

    let column = headers
        .iter()
        .skip(2)
        .position(|h| h.trim() == factor)
        .map(|i| i + 2)
        .ok_or_else(|| EbuissError::Data {
            reason: format!("factor column '{factor}' not found"),
        })?;

    let mut instruments: Vec<String> = Vec::new();
    let mut instrument_index: HashMap<String, usize> = HashMap::new();
    let mut cells: BTreeMap<NaiveDate, HashMap<usize, Option<f64>>> = BTreeMap::new();

    for result in rdr.records() {
        let record = result.map_err(|e| EbuissError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;

        let date = parse_date(record.get(0).ok_or_else(|| EbuissError::Data {
            reason: "missing date column".into(),
        })?)?;
        if !in_range(date, start, end) {
            continue;
        }

        let ticker = record
            .get(1)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EbuissError::Data {
                reason: format!("missing ticker on {date}"),
            })?;
        let value = parse_cell(record.get(column).unwrap_or(""), factor)?;

        let col = match instrument_index.get(ticker) {
            Some(&i) => i,
            None => {
                instruments.push(ticker.to_string());
                instrument_index.insert(ticker.to_string(), instruments.len() - 1);
                instruments.len() - 1
            }
        };

        if cells.entry(date).or_default().insert(col, value).is_some() {
            return Err(EbuissError::Data {
                reason: format!("duplicate entry for {ticker} on {date}"),
            });
        }
    }

    let width = instruments.len();
    let rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = cells
        .into_iter()
        .map(|(date, by_col)| {
            let row: Vec<Option<f64>> = (0..width)
                .map(|i| by_col.get(&i).copied().flatten())
                .collect();
            (date, row)
        })
        .collect();

    into_panel(rows, instruments)
}

impl PanelPort for CsvPanelAdapter {
    fn load_prices(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PricePanel, EbuissError> {
        let content = read_file(&self.prices_path)?;
        parse_wide(&content, start_date, end_date)
    }

    fn load_factors(
        &self,
        factor: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<FactorPanel, EbuissError> {
        let path = self.factors_path.as_ref().ok_or_else(|| EbuissError::Data {
            reason: "no factor file configured".into(),
        })?;
        let content = read_file(path)?;
        parse_long(&content, factor, start_date, end_date)
    }
}
