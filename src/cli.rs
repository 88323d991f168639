//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPanelAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::catalog::PanelCatalog;
use crate::domain::config_validation::{
    read_date, read_double, validate_backtest_config, validate_strategy_config,
    DEFAULT_COST_RATE, DEFAULT_INITIAL_CASH,
};
use crate::domain::error::EbuissError;
use crate::domain::evaluator::{Evaluator, MetricsTable};
use crate::domain::panel::{FactorPanel, PricePanel};
use crate::domain::registry::StrategyRegistry;
use crate::domain::simulator::{EquityPoint, Simulator, SimulatorConfig, Summary, TradeLog};
use crate::ports::config_port::ConfigPort;
use crate::ports::panel_port::PanelPort;
use crate::ports::report_port::{ReportContext, ReportPort};

pub const DEFAULT_OUTPUT_DIR: &str = "report";

#[derive(Parser, Debug)]
#[command(name = "ebuiss", about = "Factor long/short backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and write a CSV report
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Strategy id, overriding [strategy] name
        #[arg(short, long)]
        strategy: Option<String>,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List registered strategies
    ListStrategies,
    /// Show shape and date range of the configured panels
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Result of one backtest run.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub summary: Summary,
    pub trade_log: TradeLog,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: MetricsTable,
}

pub fn run(cli: Cli) -> ExitCode {
    let registry = StrategyRegistry::with_builtins();
    match cli.command {
        Command::Backtest {
            config,
            output,
            strategy,
        } => run_backtest(&registry, &config, output.as_deref(), strategy.as_deref()),
        Command::Validate { config } => run_validate(&registry, &config),
        Command::ListStrategies => run_list_strategies(&registry),
        Command::Info { config } => run_info(&config),
    }
}

fn fail(err: &EbuissError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = EbuissError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        fail(&err)
    })
}

fn run_backtest(
    registry: &StrategyRegistry,
    config_path: &Path,
    output_override: Option<&Path>,
    strategy_override: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }

    let strategy_id = match resolve_strategy_id(strategy_override, &adapter, registry) {
        Ok(id) => id,
        Err(e) => return fail(&e),
    };

    let output_dir = resolve_output_dir(output_override, &adapter);
    let panel_port = panel_adapter(&adapter);

    match run_backtest_pipeline(
        &panel_port,
        registry,
        &adapter,
        &strategy_id,
        &CsvReportAdapter,
        &output_dir,
    ) {
        Ok(outcome) => {
            print_results(&outcome);
            eprintln!("\nReport written to: {}", output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Command-line override first, then `[strategy] name`.
pub fn resolve_strategy_id(
    strategy_override: Option<&str>,
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
) -> Result<String, EbuissError> {
    match strategy_override.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) if registry.contains(id) => Ok(id.to_string()),
        Some(id) => Err(EbuissError::UnknownStrategy {
            name: id.to_string(),
        }),
        None => {
            validate_strategy_config(config, registry)?;
            Ok(config
                .get_string("strategy", "name")
                .unwrap_or_default()
                .trim()
                .to_string())
        }
    }
}

pub fn resolve_output_dir(output_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    match output_override {
        Some(p) => p.to_path_buf(),
        None => config
            .get_string("report", "output_dir")
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    }
}

pub fn build_simulator_config(config: &dyn ConfigPort) -> Result<SimulatorConfig, EbuissError> {
    Ok(SimulatorConfig {
        cost_rate: read_double(config, "backtest", "cost_rate", DEFAULT_COST_RATE)?,
        initial_cash: read_double(config, "backtest", "initial_cash", DEFAULT_INITIAL_CASH)?,
    })
}

pub fn panel_adapter(config: &dyn ConfigPort) -> CsvPanelAdapter {
    let prices = config
        .get_string("data", "prices")
        .map(|s| PathBuf::from(s.trim()))
        .unwrap_or_default();
    let factors = config
        .get_string("data", "factors")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()));
    CsvPanelAdapter::new(prices, factors)
}

/// Load the price panel and, when `[data] factor` is set, the lagged factor panel.
pub fn load_panels(
    panel_port: &dyn PanelPort,
    config: &dyn ConfigPort,
) -> Result<(PricePanel, Option<FactorPanel>), EbuissError> {
    let start = read_date(config, "backtest", "start_date")?;
    let end = read_date(config, "backtest", "end_date")?;

    let prices = panel_port.load_prices(start, end)?;
    tracing::debug!(
        periods = prices.len(),
        instruments = prices.instruments().len(),
        "loaded prices"
    );

    let factor = config
        .get_string("data", "factor")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let factors = match factor {
        Some(name) => {
            let panel = panel_port.load_factors(&name, start, end)?;
            let lag = config.get_int("data", "factor_lag", 0).max(0) as usize;
            tracing::debug!(factor = %name, lag, periods = panel.len(), "loaded factors");
            Some(if lag > 0 { panel.lagged(lag) } else { panel })
        }
        None => None,
    };

    Ok((prices, factors))
}

/// Load panels, simulate, evaluate and write the report.
pub fn run_backtest_pipeline(
    panel_port: &dyn PanelPort,
    registry: &StrategyRegistry,
    config: &dyn ConfigPort,
    strategy_id: &str,
    report_port: &dyn ReportPort,
    output_dir: &Path,
) -> Result<BacktestOutcome, EbuissError> {
    let sim_config = build_simulator_config(config)?;
    let strategy = registry.create(strategy_id, config)?;
    eprintln!("Loading strategy: {}", strategy.name());

    let (prices, factors) = load_panels(panel_port, config)?;
    eprintln!(
        "Running backtest: {} instruments, {} periods",
        prices.instruments().len(),
        prices.len(),
    );

    let mut simulator = Simulator::new(strategy, prices, factors, sim_config)?;
    let trade_log = simulator.run()?.clone();
    let equity_curve = simulator.equity_curve().to_vec();
    let summary = simulator.summary()?;
    let metrics = Evaluator::new(&trade_log, summary.strategy.clone()).evaluate()?;

    report_port.write(
        &ReportContext {
            summary: &summary,
            trade_log: &trade_log,
            equity_curve: &equity_curve,
            metrics: &metrics,
        },
        output_dir,
    )?;

    Ok(BacktestOutcome {
        summary,
        trade_log,
        equity_curve,
        metrics,
    })
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn print_results(outcome: &BacktestOutcome) {
    let s = &outcome.summary;
    eprintln!("\n=== {} ===", s.strategy);
    eprintln!("Total Return:     {:.2}%", s.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", s.annualized_return * 100.0);
    eprintln!("Final Equity:     {:.2}", s.final_equity);
    eprintln!("Periods:          {}", outcome.trade_log.len());

    eprintln!(
        "\n{:<12} {:>10} {:>10} {:>10} {:>8} {:>8} {:>10} {:>8}",
        "segment", "cum", "ann", "vol", "ret/risk", "win", "max dd", "calmar"
    );
    for (segment, m) in &outcome.metrics {
        eprintln!(
            "{:<12} {:>10} {:>10} {:>10} {:>8} {:>8} {:>10} {:>8}",
            segment.name(),
            pct(Some(m.cumulative_return)),
            pct(Some(m.annualized_return)),
            pct(m.annualized_volatility),
            ratio(m.return_to_risk),
            pct(Some(m.win_rate)),
            pct(Some(m.max_drawdown)),
            ratio(m.calmar_ratio),
        );
    }
}

fn run_validate(registry: &StrategyRegistry, config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }
    if let Err(e) = validate_strategy_config(&adapter, registry) {
        return fail(&e);
    }

    let strategy_id = adapter
        .get_string("strategy", "name")
        .unwrap_or_default()
        .trim()
        .to_string();
    let strategy = match registry.create(&strategy_id, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let sim_config = match build_simulator_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let info = strategy.info();
    eprintln!("\nStrategy: {}", info.name);
    eprintln!("  {}", info.description);
    for (key, value) in &info.parameters {
        eprintln!("  {key} = {value}");
    }
    eprintln!("\nCost rate:    {}", sim_config.cost_rate);
    eprintln!("Initial cash: {}", sim_config.initial_cash);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_list_strategies(registry: &StrategyRegistry) -> ExitCode {
    for id in registry.names() {
        println!("{:<22} {}", id, registry.description(id).unwrap_or_default());
    }
    ExitCode::SUCCESS
}

/// Load the configured panels into a catalog.
pub fn build_catalog(
    panel_port: &dyn PanelPort,
    config: &dyn ConfigPort,
) -> Result<PanelCatalog, EbuissError> {
    let (prices, factors) = load_panels(panel_port, config)?;
    let mut catalog = PanelCatalog::new();

    let returns = prices.log_returns()?;
    catalog.register("prices", prices, "close prices", false)?;
    catalog.register("returns", returns, "log returns", false)?;
    if let Some(factors) = factors {
        let factor = config.get_string("data", "factor").unwrap_or_default();
        catalog.register("factors", factors, factor.trim(), false)?;
    }
    Ok(catalog)
}

fn run_info(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }

    let catalog = match build_catalog(&panel_adapter(&adapter), &adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    for name in catalog.names() {
        let info = match catalog.info(name) {
            Ok(i) => i,
            Err(e) => return fail(&e),
        };
        let range = match (info.first_period, info.last_period) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "empty".to_string(),
        };
        println!(
            "{}: {} periods x {} instruments, {} ({})",
            info.name, info.rows, info.cols, range, info.description
        );
    }
    ExitCode::SUCCESS
}
