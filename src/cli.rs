//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::simulated_order_manager::SimulatedOrderManager;
use crate::domain::calendar::Precision;
use crate::domain::config_validation::{
    config_instruments, config_timestamp, validate_backtest_config, validate_execution_config,
    validate_strategy_config,
};
use crate::domain::drawdown::Recovery;
use crate::domain::error::LottraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::ledger::ValuationPolicy;
use crate::domain::market::MarketManager;
use crate::domain::runner::{Runner, RunnerConfig, SummaryReport};
use crate::domain::strategy::{StrategyParams, StrategyRegistry};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_CURRENCY: &str = "USD";

#[derive(Parser, Debug)]
#[command(name = "lottrader", about = "Event-driven backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy keys, comma separated; overrides [strategy] name
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List registered strategies
    Strategies,
    /// List symbols with data files for an exchange
    ListSymbols {
        #[arg(long)]
        exchange: String,
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
    },
    /// Show data range for the configured instruments
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            data_dir,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, strategy.as_deref())
            } else {
                run_backtest(&config, strategy.as_deref(), data_dir.as_deref())
            }
        }
        Command::Strategies => run_strategies(),
        Command::ListSymbols { exchange, data_dir } => run_list_symbols(&exchange, &data_dir),
        Command::Info { config, data_dir } => run_info(&config, data_dir.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_backtest(config_path: &Path, strategy: Option<&str>, data_dir: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match backtest(&adapter, strategy, data_dir) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Validate `config`, wire the CSV data source, simulated execution and the
/// built-in strategies into a runner, and run it.
pub fn backtest(
    config: &dyn ConfigPort,
    strategy_override: Option<&str>,
    data_dir_override: Option<&Path>,
) -> Result<SummaryReport, LottraderError> {
    validate_all(config)?;
    let runner_config = build_runner_config(config, strategy_override)?;
    let data_dir = resolve_data_dir(config, data_dir_override);

    eprintln!(
        "Running backtest: {} instruments, {} to {}, strategy '{}'",
        runner_config.instruments.len(),
        runner_config.entry,
        runner_config.exit,
        runner_config.strategy,
    );

    let market = MarketManager::new(Box::new(CsvAdapter::new(data_dir)));
    let executor = SimulatedOrderManager::new(build_execution_config(config));
    let mut runner = Runner::new(
        runner_config,
        Box::new(market),
        Box::new(executor),
        StrategyRegistry::with_builtins(),
    );
    runner.run()
}

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), LottraderError> {
    validate_backtest_config(config)?;
    validate_execution_config(config)?;
    validate_strategy_config(config)
}

pub fn build_runner_config(
    config: &dyn ConfigPort,
    strategy_override: Option<&str>,
) -> Result<RunnerConfig, LottraderError> {
    let strategy = match strategy_override {
        Some(s) => s.to_string(),
        None => config.require_string("strategy", "name")?,
    };

    Ok(RunnerConfig {
        entry: config_timestamp(config, "entry_date")?,
        exit: config_timestamp(config, "exit_date")?,
        currency: config
            .get_string("backtest", "currency")
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        precision: parse_setting(config, "precision")?.unwrap_or(Precision::Daily),
        strategy,
        instruments: config_instruments(config)?,
        initial_cash: config.get_double("backtest", "initial_cash", 0.0),
        valuation: parse_setting(config, "valuation")?.unwrap_or(ValuationPolicy::SliceOnly),
        params: build_strategy_params(config),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.0),
    })
}

fn parse_setting<T>(config: &dyn ConfigPort, key: &str) -> Result<Option<T>, LottraderError>
where
    T: std::str::FromStr<Err = String>,
{
    config
        .get_string("backtest", key)
        .map(|v| {
            v.parse().map_err(|reason| LottraderError::ConfigInvalid {
                section: "backtest".into(),
                key: key.into(),
                reason,
            })
        })
        .transpose()
}

pub fn build_execution_config(config: &dyn ConfigPort) -> ExecutionConfig {
    ExecutionConfig {
        commission_per_trade: config.get_double("execution", "commission_per_trade", 0.0),
        commission_pct: config.get_double("execution", "commission_pct", 0.0),
        slippage_pct: config.get_double("execution", "slippage_pct", 0.0),
        order_ttl: config.get_int("execution", "order_ttl", 0).max(0) as usize,
    }
}

pub fn build_strategy_params(config: &dyn ConfigPort) -> StrategyParams {
    let defaults = StrategyParams::default();
    StrategyParams {
        position_size: config.get_double("strategy", "position_size", defaults.position_size),
        fast_period: config
            .get_int("strategy", "fast_period", defaults.fast_period as i64)
            .max(0) as usize,
        slow_period: config
            .get_int("strategy", "slow_period", defaults.slow_period as i64)
            .max(0) as usize,
    }
}

/// `--data-dir`, then `[backtest] data_dir`, then `./data`.
pub fn resolve_data_dir(config: &dyn ConfigPort, data_dir_override: Option<&Path>) -> PathBuf {
    match data_dir_override {
        Some(dir) => dir.to_path_buf(),
        None => config
            .get_string("backtest", "data_dir")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
    }
}

fn print_summary(report: &SummaryReport) {
    let stats = &report.statistics;
    let currency = &report.currency;

    eprintln!("\n=== Backtest Results ===");
    eprintln!("Period:           {} to {} ({} steps)", report.start, report.end, report.steps);
    eprintln!("Initial Wealth:   {:.2} {currency}", stats.initial_wealth);
    eprintln!("Final Wealth:     {:.2} {currency}", stats.final_wealth);
    eprintln!("Total Return:     {:.2}%", stats.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", stats.annualized_return * 100.0);
    eprintln!("Realized P&L:     {:.2} {currency}", stats.realized_pnl);
    eprintln!("Sharpe Ratio:     {:.2}", stats.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", stats.sortino_ratio);
    eprintln!(
        "Max Drawdown:     {:.1}%",
        stats.draw_down.biggest_draw_down * 100.0
    );
    match stats.draw_down.time_to_recover {
        Recovery::Recovered(steps) => eprintln!("Recovery:         {steps} steps"),
        Recovery::NotRecovered => eprintln!("Recovery:         not recovered"),
    }
    eprintln!(
        "Closed Trades:    {} won, {} lost, {} breakeven",
        stats.winning_trades, stats.losing_trades, stats.breakeven_trades
    );
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", stats.profit_factor);

    if !report.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for trade in &report.trades {
            eprintln!("  {trade}");
        }
    }
}

pub fn run_dry_run(config_path: &Path, strategy: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let runner_config = match validate_all(&adapter)
        .and_then(|()| build_runner_config(&adapter, strategy))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Config validated successfully");

    let registry = StrategyRegistry::with_builtins();
    eprintln!("\nStrategies:");
    for key in runner_config
        .strategy
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        let status = if registry.contains(key) { "ok" } else { "unknown" };
        eprintln!("  {key}: {status}");
    }

    eprintln!("\nUniverse:");
    for instrument in &runner_config.instruments {
        eprintln!("  {instrument}");
    }
    eprintln!(
        "\nWindow: {} to {} ({})",
        runner_config.entry, runner_config.exit, runner_config.precision
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_strategies() -> ExitCode {
    for (key, description) in StrategyRegistry::with_builtins().describe() {
        println!("{key:<16} {description}");
    }
    ExitCode::SUCCESS
}

fn run_list_symbols(exchange: &str, data_dir: &Path) -> ExitCode {
    let adapter = CsvAdapter::new(data_dir.to_path_buf());
    match adapter.list_symbols(exchange) {
        Ok(symbols) if symbols.is_empty() => {
            eprintln!("No symbols found for exchange {exchange}");
            ExitCode::SUCCESS
        }
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{symbol}");
            }
            eprintln!("{} symbols found", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_info(config_path: &Path, data_dir: Option<&Path>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let instruments = match config_instruments(&config) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let adapter = CsvAdapter::new(resolve_data_dir(&config, data_dir));
    for instrument in &instruments {
        match adapter.data_range(instrument) {
            Ok(Some((first, last, count))) => {
                println!("{instrument}: {count} candles, {first} to {last}");
            }
            Ok(None) => eprintln!("{instrument}: no data found"),
            Err(e) => eprintln!("error reading {instrument}: {e}"),
        }
    }
    ExitCode::SUCCESS
}
