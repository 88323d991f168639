//! Position-driven equity simulation.
//!
//! The simulator folds a strategy's position matrix over the log-return panel,
//! one period at a time, and records a [`TradeLogEntry`] per period. Equity
//! compounds on the long/short spread only; the individual segment means are
//! kept for attribution.
//!
//! A `Simulator` is not meant to be shared between threads: it owns its
//! strategy and trade log exclusively.

use crate::domain::error::EbuissError;
use crate::domain::panel::{FactorPanel, PricePanel, ReturnPanel};
use crate::domain::position::Position;
use crate::domain::strategy::Strategy;
use chrono::NaiveDate;

/// Fixed annualization constant; periods are assumed to be weekly.
pub const PERIODS_PER_YEAR: f64 = 52.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    /// Cost per changed position, as a fraction of the per-instrument notional.
    pub cost_rate: f64,
    pub initial_cash: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            cost_rate: 0.001,
            initial_cash: 1_000_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeLogEntry {
    pub period: NaiveDate,
    /// Equity after this period's return and cost.
    pub cash: f64,
    pub buy_ret: Option<f64>,
    pub sell_ret: Option<f64>,
    pub neutral_ret: Option<f64>,
    pub long_short_ret: f64,
    pub cost: f64,
}

pub type TradeLog = Vec<TradeLogEntry>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub period: NaiveDate,
    pub cash: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub strategy: String,
    pub total_return: f64,
    pub annualized_return: f64,
    pub final_equity: f64,
}

pub struct Simulator {
    strategy: Box<dyn Strategy>,
    prices: PricePanel,
    returns: ReturnPanel,
    factors: Option<FactorPanel>,
    config: SimulatorConfig,
    trade_log: TradeLog,
    equity_curve: Vec<EquityPoint>,
}

impl Simulator {
    pub fn new(
        strategy: Box<dyn Strategy>,
        prices: PricePanel,
        factors: Option<FactorPanel>,
        config: SimulatorConfig,
    ) -> Result<Self, EbuissError> {
        if !config.cost_rate.is_finite() || config.cost_rate < 0.0 {
            return Err(EbuissError::invalid_input(format!(
                "cost rate must be non-negative, got {}",
                config.cost_rate
            )));
        }
        if !config.initial_cash.is_finite() || config.initial_cash <= 0.0 {
            return Err(EbuissError::invalid_input(format!(
                "initial cash must be positive, got {}",
                config.initial_cash
            )));
        }

        let returns = prices.log_returns()?;
        // factor rows outside the return axis are dropped, not re-validated
        let factors = factors.map(|f| f.restrict_periods(returns.periods()));

        if let Some(f) = &factors {
            let shared = f
                .instruments()
                .iter()
                .any(|id| prices.instrument_index(id).is_some());
            if !shared {
                return Err(EbuissError::Alignment {
                    reason: format!(
                        "none of the {} factor columns match a price column",
                        f.instruments().len()
                    ),
                });
            }
        }

        Ok(Self {
            strategy,
            prices,
            returns,
            factors,
            config,
            trade_log: Vec::new(),
            equity_curve: Vec::new(),
        })
    }

    /// Run the simulation. On error the previous trade log is left untouched.
    pub fn run(&mut self) -> Result<&TradeLog, EbuissError> {
        let positions = self
            .strategy
            .generate_positions(&self.prices, self.factors.as_ref())?;

        tracing::info!(
            strategy = %self.strategy.name(),
            position_periods = positions.len(),
            return_periods = self.returns.len(),
            "starting simulation"
        );

        if positions.is_empty() {
            self.trade_log = Vec::new();
            self.equity_curve = Vec::new();
            return Ok(&self.trade_log);
        }

        // common instrument axis, in return-panel order: (return col, position col)
        let common: Vec<(usize, usize)> = self
            .returns
            .instruments()
            .iter()
            .enumerate()
            .filter_map(|(ri, id)| {
                positions
                    .instruments()
                    .iter()
                    .position(|p| p == id)
                    .map(|pi| (ri, pi))
            })
            .collect();

        if common.is_empty() {
            return Err(EbuissError::Alignment {
                reason: format!(
                    "strategy {} positions share no instruments with the price panel",
                    self.strategy.name()
                ),
            });
        }

        let dropped = positions.instruments().len() - common.len();
        if dropped > 0 {
            tracing::debug!(dropped, "ignoring position columns without prices");
        }

        let mut cash = self.config.initial_cash;
        let mut prev: Vec<Position> = vec![Position::Neutral; common.len()];
        let mut trade_log = Vec::with_capacity(positions.len());

        for row in positions.rows() {
            let Some(ret_row) = self.returns.row(row.period) else {
                continue;
            };

            let current: Vec<Position> = common.iter().map(|&(_, pi)| row.state(pi)).collect();
            let rets: Vec<Option<f64>> = common.iter().map(|&(ri, _)| ret_row[ri]).collect();

            let buy_ret = segment_mean(&current, &rets, Position::Long);
            let sell_ret = segment_mean(&current, &rets, Position::Short);
            let neutral_ret = segment_mean(&current, &rets, Position::Neutral);
            let long_short_ret = match (buy_ret, sell_ret) {
                (Some(b), Some(s)) => b - s,
                _ => 0.0,
            };

            let num_changes = current.iter().zip(&prev).filter(|(c, p)| c != p).count();
            let avg_notional = if current.is_empty() {
                0.0
            } else {
                cash / current.len() as f64
            };
            let cost = self.config.cost_rate * avg_notional * num_changes as f64;

            cash = cash * (1.0 + long_short_ret) - cost;

            tracing::debug!(
                period = %row.period,
                cash,
                long_short_ret,
                num_changes,
                cost,
                "simulated period"
            );

            trade_log.push(TradeLogEntry {
                period: row.period,
                cash,
                buy_ret,
                sell_ret,
                neutral_ret,
                long_short_ret,
                cost,
            });
            prev = current;
        }

        self.equity_curve = trade_log
            .iter()
            .map(|e| EquityPoint {
                period: e.period,
                cash: e.cash,
            })
            .collect();
        self.trade_log = trade_log;

        tracing::info!(
            periods = self.trade_log.len(),
            final_cash = cash,
            "simulation finished"
        );
        Ok(&self.trade_log)
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trade_log
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn summary(&self) -> Result<Summary, EbuissError> {
        let last = self
            .equity_curve
            .last()
            .ok_or_else(|| EbuissError::degenerate("equity curve is empty; nothing to summarize"))?;

        let total_return = last.cash / self.config.initial_cash - 1.0;
        let annualized_return =
            (1.0 + total_return).powf(PERIODS_PER_YEAR / self.equity_curve.len() as f64) - 1.0;

        Ok(Summary {
            strategy: self.strategy.name().to_string(),
            total_return,
            annualized_return,
            final_equity: last.cash,
        })
    }
}

/// Mean return over instruments holding `state`; `None` if none do.
fn segment_mean(states: &[Position], rets: &[Option<f64>], state: Position) -> Option<f64> {
    let (sum, count) = states
        .iter()
        .zip(rets)
        .filter(|(s, _)| **s == state)
        .filter_map(|(_, r)| *r)
        .fold((0.0, 0usize), |(sum, n), r| (sum + r, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
