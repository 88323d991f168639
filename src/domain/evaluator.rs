//! Segment performance metrics.
//!
//! Reduces a trade log into one [`SegmentMetrics`] record per return segment.
//! Missing segment returns count as zero when compounding; volatility only
//! sees the returns that are present.

use crate::domain::error::EbuissError;
use crate::domain::simulator::{PERIODS_PER_YEAR, TradeLogEntry};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Buy,
    Sell,
    Neutral,
    LongShort,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Segment::Buy,
        Segment::Sell,
        Segment::Neutral,
        Segment::LongShort,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Segment::Buy => "buy",
            Segment::Sell => "sell",
            Segment::Neutral => "neutral",
            Segment::LongShort => "long_short",
        }
    }

    pub fn value(self, entry: &TradeLogEntry) -> Option<f64> {
        match self {
            Segment::Buy => entry.buy_ret,
            Segment::Sell => entry.sell_ret,
            Segment::Neutral => entry.neutral_ret,
            Segment::LongShort => Some(entry.long_short_ret),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMetrics {
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: Option<f64>,
    pub return_to_risk: Option<f64>,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: Option<f64>,
}

impl SegmentMetrics {
    pub fn compute(returns: &[Option<f64>]) -> Result<Self, EbuissError> {
        if returns.is_empty() {
            return Err(EbuissError::degenerate(
                "segment has no periods to evaluate",
            ));
        }
        let n = returns.len() as f64;

        let equity = compound(returns);
        let cumulative_return = equity.last().copied().unwrap_or(1.0) - 1.0;
        let annualized_return = (1.0 + cumulative_return).powf(PERIODS_PER_YEAR / n) - 1.0;

        let annualized_volatility =
            sample_std(returns).map(|sd| sd * PERIODS_PER_YEAR.sqrt());
        let return_to_risk = match annualized_volatility {
            Some(vol) if vol != 0.0 => Some(annualized_return / vol),
            _ => None,
        };

        let wins = returns.iter().flatten().filter(|r| **r > 0.0).count();
        let win_rate = wins as f64 / n;

        let max_drawdown = max_drawdown(&equity);
        let calmar_ratio = if max_drawdown < 0.0 {
            Some(annualized_return / max_drawdown.abs())
        } else {
            None
        };

        Ok(SegmentMetrics {
            cumulative_return,
            annualized_return,
            annualized_volatility,
            return_to_risk,
            win_rate,
            max_drawdown,
            calmar_ratio,
        })
    }
}

pub type MetricsTable = BTreeMap<Segment, SegmentMetrics>;

pub struct Evaluator<'a> {
    trade_log: &'a [TradeLogEntry],
    strategy_name: String,
}

impl<'a> Evaluator<'a> {
    pub fn new(trade_log: &'a [TradeLogEntry], strategy_name: impl Into<String>) -> Self {
        Self {
            trade_log,
            strategy_name: strategy_name.into(),
        }
    }

    pub fn evaluate(&self) -> Result<MetricsTable, EbuissError> {
        if self.trade_log.is_empty() {
            return Err(EbuissError::degenerate(format!(
                "trade log for {} is empty",
                self.strategy_name
            )));
        }

        let mut table = MetricsTable::new();
        for segment in Segment::ALL {
            let returns: Vec<Option<f64>> =
                self.trade_log.iter().map(|e| segment.value(e)).collect();
            table.insert(segment, SegmentMetrics::compute(&returns)?);
        }

        tracing::info!(
            strategy = %self.strategy_name,
            periods = self.trade_log.len(),
            "evaluated trade log"
        );
        Ok(table)
    }
}

/// Running sum of each segment's returns (missing as zero), for charting.
pub fn segment_cumulative(trade_log: &[TradeLogEntry]) -> Vec<(NaiveDate, [f64; 4])> {
    let mut totals = [0.0; 4];
    trade_log
        .iter()
        .map(|entry| {
            for (total, segment) in totals.iter_mut().zip(Segment::ALL) {
                *total += segment.value(entry).unwrap_or(0.0);
            }
            (entry.period, totals)
        })
        .collect()
}

fn compound(returns: &[Option<f64>]) -> Vec<f64> {
    let mut level = 1.0;
    returns
        .iter()
        .map(|r| {
            level *= 1.0 + r.unwrap_or(0.0);
            level
        })
        .collect()
}

fn sample_std(returns: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = returns.iter().flatten().copied().collect();
    if present.len() < 2 {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let variance = present.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Most negative `equity / running_peak - 1`; zero when equity never dips.
fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &level in equity {
        peak = peak.max(level);
        worst = worst.min(level / peak - 1.0);
    }
    worst
}
