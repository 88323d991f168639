//! Position states and the per-period position matrix.

use crate::domain::error::EbuissError;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Position {
    Long,
    Short,
    #[default]
    Neutral,
}

impl Position {
    pub fn sign(self) -> i64 {
        match self {
            Position::Long => 1,
            Position::Short => -1,
            Position::Neutral => 0,
        }
    }
}

impl TryFrom<i64> for Position {
    type Error = EbuissError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Position::Long),
            -1 => Ok(Position::Short),
            0 => Ok(Position::Neutral),
            other => Err(EbuissError::invalid_input(format!(
                "position value must be -1, 0 or 1, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sign())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub period: NaiveDate,
    pub states: Vec<Option<Position>>,
}

impl PositionRow {
    /// State of column `i`, reading a missing entry as neutral.
    pub fn state(&self, i: usize) -> Position {
        self.states.get(i).copied().flatten().unwrap_or_default()
    }
}

/// Target positions per period, as produced by a strategy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionMatrix {
    instruments: Vec<String>,
    rows: Vec<PositionRow>,
}

impl PositionMatrix {
    pub fn new(instruments: Vec<String>) -> Self {
        Self {
            instruments,
            rows: Vec::new(),
        }
    }

    pub fn push_row(
        &mut self,
        period: NaiveDate,
        states: Vec<Option<Position>>,
    ) -> Result<(), EbuissError> {
        if states.len() != self.instruments.len() {
            return Err(EbuissError::invalid_input(format!(
                "position row {} has {} entries, expected {}",
                period,
                states.len(),
                self.instruments.len()
            )));
        }
        if let Some(last) = self.rows.last() {
            if period <= last.period {
                return Err(EbuissError::invalid_input(format!(
                    "position periods must be strictly increasing ({} follows {})",
                    period, last.period
                )));
            }
        }
        self.rows.push(PositionRow { period, states });
        Ok(())
    }

    /// Push a row of raw `-1/0/1` labels.
    pub fn push_values(&mut self, period: NaiveDate, values: &[i64]) -> Result<(), EbuissError> {
        let states = values
            .iter()
            .map(|&v| Position::try_from(v).map(Some))
            .collect::<Result<Vec<_>, _>>()?;
        self.push_row(period, states)
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn rows(&self) -> &[PositionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, period: NaiveDate, instrument: &str) -> Option<Position> {
        let col = self.instruments.iter().position(|id| id == instrument)?;
        self.rows
            .iter()
            .find(|r| r.period == period)
            .map(|r| r.state(col))
    }
}
