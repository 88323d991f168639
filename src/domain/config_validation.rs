//! Configuration validation.
//!
//! Validates all config fields before a backtest runs.

use crate::domain::error::EbuissError;
use crate::domain::registry::StrategyRegistry;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DEFAULT_COST_RATE: f64 = 0.001;
pub const DEFAULT_INITIAL_CASH: f64 = 1_000_000.0;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EbuissError> {
    validate_prices(config)?;
    validate_factors(config)?;
    validate_cost_rate(config)?;
    validate_initial_cash(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
) -> Result<(), EbuissError> {
    match config.get_string("strategy", "name") {
        Some(name) if !name.trim().is_empty() => {
            if registry.contains(name.trim()) {
                Ok(())
            } else {
                Err(EbuissError::UnknownStrategy {
                    name: name.trim().to_string(),
                })
            }
        }
        _ => Err(EbuissError::ConfigMissing {
            section: "strategy".to_string(),
            key: "name".to_string(),
        }),
    }
}

/// Read a float, failing on a present but non-numeric value.
pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EbuissError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| EbuissError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("expected a number, got '{}'", raw.trim()),
        }),
    }
}

/// Optional `YYYY-MM-DD` date.
pub fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, EbuissError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| EbuissError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("invalid {key} format, expected YYYY-MM-DD"),
            }),
    }
}

fn validate_prices(config: &dyn ConfigPort) -> Result<(), EbuissError> {
    match config.get_string("data", "prices") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(EbuissError::ConfigMissing {
            section: "data".to_string(),
            key: "prices".to_string(),
        }),
    }
}

fn validate_factors(config: &dyn ConfigPort) -> Result<(), EbuissError> {
    let factors = config
        .get_string("data", "factors")
        .filter(|s| !s.trim().is_empty());
    let factor = config
        .get_string("data", "factor")
        .filter(|s| !s.trim().is_empty());

    if factors.is_some() && factor.is_none() {
        return Err(EbuissError::ConfigMissing {
            section: "data".to_string(),
            key: "factor".to_string(),
        });
    }

    if let Some(raw) = config.get_string("data", "factor_lag") {
        match raw.trim().parse::<i64>() {
            Ok(lag) if lag >= 0 => {}
            _ => {
                return Err(EbuissError::ConfigInvalid {
                    section: "data".to_string(),
                    key: "factor_lag".to_string(),
                    reason: "factor_lag must be a non-negative integer".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_cost_rate(config: &dyn ConfigPort) -> Result<(), EbuissError> {
    let value = read_double(config, "backtest", "cost_rate", DEFAULT_COST_RATE)?;
    if !value.is_finite() || value < 0.0 {
        return Err(EbuissError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "cost_rate".to_string(),
            reason: "cost_rate must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), EbuissError> {
    let value = read_double(config, "backtest", "initial_cash", DEFAULT_INITIAL_CASH)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(EbuissError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_cash".to_string(),
            reason: "initial_cash must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), EbuissError> {
    let start = read_date(config, "backtest", "start_date")?;
    let end = read_date(config, "backtest", "end_date")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(EbuissError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must be before end_date".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[data]
prices = prices.csv
factors = factors.csv
factor = momentum
factor_lag = 1

[backtest]
cost_rate = 0.001
initial_cash = 1000000
start_date = 2020-01-01
end_date = 2024-12-31
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn defaults_are_valid() {
        let config = make_config("[data]\nprices = prices.csv\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn prices_are_required() {
        let config = make_config("[backtest]\ncost_rate = 0.001\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigMissing { key, .. } if key == "prices"));
    }

    #[test]
    fn factors_need_a_factor_name() {
        let config = make_config("[data]\nprices = p.csv\nfactors = f.csv\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigMissing { key, .. } if key == "factor"));
    }

    #[test]
    fn negative_factor_lag_fails() {
        let config = make_config("[data]\nprices = p.csv\nfactor_lag = -1\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigInvalid { key, .. } if key == "factor_lag"));
    }

    #[test]
    fn negative_cost_rate_fails() {
        let config = make_config("[data]\nprices = p.csv\n[backtest]\ncost_rate = -0.01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigInvalid { key, .. } if key == "cost_rate"));
    }

    #[test]
    fn non_numeric_cost_rate_fails() {
        let config = make_config("[data]\nprices = p.csv\n[backtest]\ncost_rate = cheap\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigInvalid { key, .. } if key == "cost_rate"));
    }

    #[test]
    fn zero_initial_cash_fails() {
        let config = make_config("[data]\nprices = p.csv\n[backtest]\ninitial_cash = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn start_must_precede_end() {
        let config = make_config(
            "[data]\nprices = p.csv\n[backtest]\nstart_date = 2024-01-01\nend_date = 2023-01-01\n",
        );
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn bad_date_format_fails() {
        let config = make_config("[data]\nprices = p.csv\n[backtest]\nend_date = 31/12/2024\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigInvalid { key, .. } if key == "end_date"));
    }

    #[test]
    fn strategy_name_is_required() {
        let registry = StrategyRegistry::with_builtins();
        let config = make_config("[strategy]\nlower_q = 0.2\n");
        let err = validate_strategy_config(&config, &registry).unwrap_err();
        assert!(matches!(err, EbuissError::ConfigMissing { key, .. } if key == "name"));
    }

    #[test]
    fn strategy_must_be_registered() {
        let registry = StrategyRegistry::with_builtins();
        let config = make_config("[strategy]\nname = momentum\n");
        let err = validate_strategy_config(&config, &registry).unwrap_err();
        assert!(matches!(err, EbuissError::UnknownStrategy { .. }));

        let config = make_config("[strategy]\nname = factor_quantile\n");
        assert!(validate_strategy_config(&config, &registry).is_ok());
    }
}
