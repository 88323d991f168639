//! Strategy contract and the built-in factor strategies.
//!
//! A strategy turns a price panel (and optionally a factor panel) into a
//! [`PositionMatrix`]. Name, description and parameters are informational and
//! live in a plain [`StrategyInfo`] record.

use crate::domain::error::EbuissError;
use crate::domain::panel::{FactorPanel, PricePanel};
use crate::domain::position::{Position, PositionMatrix};
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyInfo {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
}

/// Produces target positions from price and factor panels.
///
/// The returned matrix should only use periods of `prices`. Strategies are not
/// required to be `Send` or `Sync`; a simulator drives one strategy from a
/// single thread.
pub trait Strategy {
    fn info(&self) -> &StrategyInfo;

    fn generate_positions(
        &self,
        prices: &PricePanel,
        factors: Option<&FactorPanel>,
    ) -> Result<PositionMatrix, EbuissError>;

    fn name(&self) -> &str {
        &self.info().name
    }
}

fn require_factors<'a>(
    factors: Option<&'a FactorPanel>,
    strategy: &str,
) -> Result<&'a FactorPanel, EbuissError> {
    factors.ok_or_else(|| {
        EbuissError::invalid_input(format!("a factor panel is required for {strategy}"))
    })
}

/// Linearly interpolated quantile of an already sorted slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Long the top of the factor distribution, short the bottom.
#[derive(Debug, Clone)]
pub struct QuantileLongShort {
    lower_q: f64,
    upper_q: f64,
    info: StrategyInfo,
}

impl QuantileLongShort {
    pub const ID: &'static str = "quantile_long_short";

    pub fn new(lower_q: f64, upper_q: f64) -> Result<Self, EbuissError> {
        if !(0.0..=1.0).contains(&lower_q) || !(0.0..=1.0).contains(&upper_q) {
            return Err(EbuissError::invalid_input(
                "quantile bounds must lie in [0, 1]",
            ));
        }
        if lower_q >= upper_q {
            return Err(EbuissError::invalid_input(format!(
                "lower_q ({lower_q}) must be below upper_q ({upper_q})"
            )));
        }

        let mut parameters = BTreeMap::new();
        parameters.insert("lower_q".to_string(), lower_q.to_string());
        parameters.insert("upper_q".to_string(), upper_q.to_string());

        Ok(Self {
            lower_q,
            upper_q,
            info: StrategyInfo {
                name: "QuantileLongShort".to_string(),
                description: format!(
                    "Long instruments scoring at or above the {upper_q} factor quantile, \
                     short those at or below the {lower_q} quantile."
                ),
                parameters,
            },
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Box<dyn Strategy>, EbuissError> {
        let lower_q = config.get_double("strategy", "lower_q", 0.2);
        let upper_q = config.get_double("strategy", "upper_q", 0.8);
        Ok(Box::new(Self::new(lower_q, upper_q)?))
    }
}

impl Strategy for QuantileLongShort {
    fn info(&self) -> &StrategyInfo {
        &self.info
    }

    fn generate_positions(
        &self,
        prices: &PricePanel,
        factors: Option<&FactorPanel>,
    ) -> Result<PositionMatrix, EbuissError> {
        let factors = require_factors(factors, &self.info.name)?;

        // factor column for each price column
        let mapping: Vec<Option<usize>> = prices
            .instruments()
            .iter()
            .map(|id| factors.instrument_index(id))
            .collect();

        let mut matrix = PositionMatrix::new(prices.instruments().to_vec());
        for &period in prices.periods() {
            let mut states = vec![Some(Position::Neutral); mapping.len()];

            if let Some(scores) = factors.row(period) {
                let mut present: Vec<f64> = scores.iter().flatten().copied().collect();
                present.sort_by(f64::total_cmp);

                if let (Some(q_low), Some(q_high)) = (
                    quantile(&present, self.lower_q),
                    quantile(&present, self.upper_q),
                ) {
                    for (state, col) in states.iter_mut().zip(&mapping) {
                        let Some(score) = col.and_then(|c| scores[c]) else {
                            continue;
                        };
                        if score >= q_high {
                            *state = Some(Position::Long);
                        }
                        if score <= q_low {
                            *state = Some(Position::Short);
                        }
                    }
                }
            }

            matrix.push_row(period, states)?;
        }

        Ok(matrix)
    }
}

/// Rank instruments into equal-frequency bins and trade two of them.
#[derive(Debug, Clone)]
pub struct FactorQuantile {
    n_quantiles: usize,
    long_quantile: usize,
    short_quantile: usize,
    higher_is_better: bool,
    info: StrategyInfo,
}

impl FactorQuantile {
    pub const ID: &'static str = "factor_quantile";

    pub fn new(
        n_quantiles: usize,
        long_quantile: usize,
        short_quantile: usize,
        higher_is_better: bool,
    ) -> Result<Self, EbuissError> {
        if n_quantiles < 2 {
            return Err(EbuissError::invalid_input(
                "n_quantiles must be at least 2",
            ));
        }
        if long_quantile >= n_quantiles || short_quantile >= n_quantiles {
            return Err(EbuissError::invalid_input(format!(
                "quantile indices must be below n_quantiles ({n_quantiles})"
            )));
        }
        if long_quantile == short_quantile {
            return Err(EbuissError::invalid_input(
                "long_quantile and short_quantile must differ",
            ));
        }

        let mut parameters = BTreeMap::new();
        parameters.insert("n_quantiles".to_string(), n_quantiles.to_string());
        parameters.insert("long_quantile".to_string(), long_quantile.to_string());
        parameters.insert("short_quantile".to_string(), short_quantile.to_string());
        parameters.insert("higher_is_better".to_string(), higher_is_better.to_string());

        Ok(Self {
            n_quantiles,
            long_quantile,
            short_quantile,
            higher_is_better,
            info: StrategyInfo {
                name: format!("FactorQuantile{n_quantiles}"),
                description: format!(
                    "Ranks instruments by factor into {n_quantiles} bins; long bin {long_quantile}, \
                     short bin {short_quantile} (bin {} holds the most preferred scores).",
                    n_quantiles - 1
                ),
                parameters,
            },
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Box<dyn Strategy>, EbuissError> {
        let n_quantiles = config.get_int("strategy", "n_quantiles", 5);
        let long_quantile = config.get_int("strategy", "long_quantile", n_quantiles - 1);
        let short_quantile = config.get_int("strategy", "short_quantile", 0);
        if n_quantiles < 0 || long_quantile < 0 || short_quantile < 0 {
            return Err(EbuissError::ConfigInvalid {
                section: "strategy".into(),
                key: "n_quantiles".into(),
                reason: "quantile settings must be non-negative".into(),
            });
        }
        let higher_is_better = config.get_bool("strategy", "higher_is_better", true);
        Ok(Box::new(Self::new(
            n_quantiles as usize,
            long_quantile as usize,
            short_quantile as usize,
            higher_is_better,
        )?))
    }

    /// Bin index for each column of `scores`; `None` where the score is missing
    /// or too few instruments are scored to bin.
    fn assign_bins(&self, scores: &[Option<f64>]) -> Vec<Option<usize>> {
        let mut ranked: Vec<(usize, f64)> = scores
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|v| (i, v)))
            .collect();
        let mut bins = vec![None; scores.len()];
        let m = ranked.len();
        if m < 2 {
            return bins;
        }

        // stable sort: ties keep column order
        if self.higher_is_better {
            ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        } else {
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        }

        let n = self.n_quantiles as f64;
        let span = (m - 1) as f64;
        for (pos, (col, _)) in ranked.into_iter().enumerate() {
            let rank = (pos + 1) as f64;
            let bin = (0..self.n_quantiles)
                .find(|&k| rank <= 1.0 + span * (k + 1) as f64 / n)
                .unwrap_or(self.n_quantiles - 1);
            bins[col] = Some(bin);
        }
        bins
    }
}

impl Strategy for FactorQuantile {
    fn info(&self) -> &StrategyInfo {
        &self.info
    }

    fn generate_positions(
        &self,
        _prices: &PricePanel,
        factors: Option<&FactorPanel>,
    ) -> Result<PositionMatrix, EbuissError> {
        let factors = require_factors(factors, &self.info.name)?;

        let mut matrix = PositionMatrix::new(factors.instruments().to_vec());
        for (period, scores) in factors.rows() {
            let states = self
                .assign_bins(scores)
                .into_iter()
                .map(|bin| match bin {
                    Some(b) if b == self.long_quantile => Some(Position::Long),
                    Some(b) if b == self.short_quantile => Some(Position::Short),
                    _ => Some(Position::Neutral),
                })
                .collect();
            matrix.push_row(period, states)?;
        }

        tracing::debug!(
            strategy = %self.info.name,
            periods = matrix.len(),
            "generated factor quantile positions"
        );
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::Panel;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{i}")).collect()
    }

    fn flat_prices(periods: &[NaiveDate], n: usize) -> Panel {
        Panel::new(
            periods.to_vec(),
            ids(n),
            periods.iter().map(|_| vec![Some(100.0); n]).collect(),
        )
        .unwrap()
    }

    fn factor_row(period: NaiveDate, scores: &[Option<f64>]) -> Panel {
        Panel::new(vec![period], ids(scores.len()), vec![scores.to_vec()]).unwrap()
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 1.0), Some(5.0));
        assert!((quantile(&sorted, 0.2).unwrap() - 1.8).abs() < 1e-12);
        assert!((quantile(&sorted, 0.8).unwrap() - 4.2).abs() < 1e-12);
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn quantile_long_short_requires_factors() {
        let s = QuantileLongShort::new(0.2, 0.8).unwrap();
        let prices = flat_prices(&[d(1)], 3);
        let result = s.generate_positions(&prices, None);
        assert!(matches!(result, Err(EbuissError::InvalidInput { .. })));
    }

    #[test]
    fn quantile_long_short_rejects_inverted_bounds() {
        assert!(QuantileLongShort::new(0.8, 0.2).is_err());
        assert!(QuantileLongShort::new(-0.1, 0.5).is_err());
    }

    #[test]
    fn quantile_long_short_marks_tails() {
        let s = QuantileLongShort::new(0.2, 0.8).unwrap();
        let prices = flat_prices(&[d(1), d(8)], 5);
        let factors = factor_row(
            d(8),
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
        );

        let m = s.generate_positions(&prices, Some(&factors)).unwrap();
        assert_eq!(m.len(), 2);

        // period without factor data stays neutral
        assert!(m.rows()[0].states.iter().all(|s| *s == Some(Position::Neutral)));

        let row = &m.rows()[1];
        assert_eq!(row.state(0), Position::Short);
        assert_eq!(row.state(1), Position::Neutral);
        assert_eq!(row.state(2), Position::Neutral);
        assert_eq!(row.state(3), Position::Neutral);
        assert_eq!(row.state(4), Position::Long);
    }

    #[test]
    fn quantile_long_short_missing_scores_stay_neutral() {
        let s = QuantileLongShort::new(0.2, 0.8).unwrap();
        let prices = flat_prices(&[d(1)], 3);
        let factors = factor_row(d(1), &[Some(1.0), None, Some(3.0)]);

        let m = s.generate_positions(&prices, Some(&factors)).unwrap();
        let row = &m.rows()[0];
        assert_eq!(row.state(0), Position::Short);
        assert_eq!(row.state(1), Position::Neutral);
        assert_eq!(row.state(2), Position::Long);
    }

    #[test]
    fn quantile_long_short_ties_go_short() {
        let s = QuantileLongShort::new(0.2, 0.8).unwrap();
        let prices = flat_prices(&[d(1)], 2);
        let factors = factor_row(d(1), &[Some(1.0), Some(1.0)]);

        let m = s.generate_positions(&prices, Some(&factors)).unwrap();
        assert_eq!(m.rows()[0].state(0), Position::Short);
        assert_eq!(m.rows()[0].state(1), Position::Short);
    }

    #[test]
    fn factor_quantile_validates_parameters() {
        assert!(FactorQuantile::new(1, 0, 0, true).is_err());
        assert!(FactorQuantile::new(5, 5, 0, true).is_err());
        assert!(FactorQuantile::new(5, 2, 2, true).is_err());
        assert!(FactorQuantile::new(5, 4, 0, true).is_ok());
    }

    #[test]
    fn factor_quantile_bins_ten_instruments() {
        let s = FactorQuantile::new(5, 4, 0, true).unwrap();
        let scores: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        let bins = s.assign_bins(&scores);
        let expected = [0, 0, 1, 1, 2, 2, 3, 3, 4, 4];
        for (bin, want) in bins.iter().zip(expected) {
            assert_eq!(*bin, Some(want));
        }
    }

    #[test]
    fn factor_quantile_lower_is_better_flips_bins() {
        let s = FactorQuantile::new(5, 4, 0, false).unwrap();
        let scores: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        let bins = s.assign_bins(&scores);
        assert_eq!(bins[0], Some(4));
        assert_eq!(bins[9], Some(0));
    }

    #[test]
    fn factor_quantile_generates_long_and_short() {
        let s = FactorQuantile::new(5, 4, 0, true).unwrap();
        let prices = flat_prices(&[d(1)], 10);
        let scores: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        let factors = factor_row(d(1), &scores);

        let m = s.generate_positions(&prices, Some(&factors)).unwrap();
        let row = &m.rows()[0];
        let longs = (0..10).filter(|&i| row.state(i) == Position::Long).count();
        let shorts = (0..10).filter(|&i| row.state(i) == Position::Short).count();
        assert_eq!(longs, 2);
        assert_eq!(shorts, 2);
        assert_eq!(row.state(9), Position::Long);
        assert_eq!(row.state(0), Position::Short);
    }

    #[test]
    fn factor_quantile_single_score_is_neutral() {
        let s = FactorQuantile::new(5, 4, 0, true).unwrap();
        let prices = flat_prices(&[d(1)], 3);
        let factors = factor_row(d(1), &[None, Some(2.0), None]);

        let m = s.generate_positions(&prices, Some(&factors)).unwrap();
        assert!((0..3).all(|i| m.rows()[0].state(i) == Position::Neutral));
    }

    #[test]
    fn info_records_parameters() {
        let s = FactorQuantile::new(5, 4, 0, true).unwrap();
        assert_eq!(s.name(), "FactorQuantile5");
        assert_eq!(s.info().parameters.get("n_quantiles").unwrap(), "5");
        assert!(!s.info().description.is_empty());
    }
}
