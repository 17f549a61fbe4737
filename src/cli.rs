//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    data_window, grid_config_from, grid_formula, grid_trend, rebalance_params,
    validate_data_config, validate_grid_config, validate_rebalance_config,
};
use crate::domain::error::GridfixError;
use crate::domain::formula::Expr;
use crate::domain::grid::{run_grid, GridConfig, GridRun};
use crate::domain::metrics::RunMetrics;
use crate::domain::rebalance::{rebalance_amount, EquityPoint};
use crate::domain::risk::grid_risk;
use crate::domain::spread::{build_spread, SeriesWindow};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "gridfix", about = "Grid ladder backtester for prices and spreads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the grid simulator
    Fix {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Trade a single symbol instead of the configured formula
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the constant-notional rebalancing walk
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Worst-case loss of a grid before its stop
    Risk {
        #[arg(long)]
        work_range: f64,
        #[arg(long)]
        step: f64,
        #[arg(long)]
        stop_range: f64,
        #[arg(long, default_value_t = 1.0)]
        qty_per_level: f64,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List cached symbols on an exchange
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
    },
    /// Show the stored range of a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        exchange: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Fix {
            config,
            output,
            symbol,
            exchange,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_fix(&config, output.as_deref(), symbol.as_deref(), exchange.as_deref())
            }
        }
        Command::Rebalance { config, output } => run_rebalance(&config, output.as_deref()),
        Command::Risk {
            work_range,
            step,
            stop_range,
            qty_per_level,
        } => run_risk(work_range, step, stop_range, qty_per_level),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config, exchange } => {
            run_list_symbols(&config, exchange.as_deref())
        }
        Command::Info {
            config,
            symbol,
            exchange,
        } => run_info(&config, &symbol, exchange.as_deref()),
    }
}

fn report_error(e: GridfixError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(report_error)
}

/// Everything a grid run needs besides the data itself.
#[derive(Debug, Clone)]
pub struct FixJob {
    pub formula: Expr,
    pub trend: Option<Expr>,
    pub grid: GridConfig,
    pub window: SeriesWindow,
}

pub fn resolve_exchange(
    exchange_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, GridfixError> {
    match exchange_override {
        Some(e) => Ok(e.to_string()),
        None => config
            .get_string("data", "exchange")
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| GridfixError::ConfigMissing {
                section: "data".into(),
                key: "exchange".into(),
            }),
    }
}

pub fn series_window(
    exchange_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<SeriesWindow, GridfixError> {
    let (start, end) = data_window(config)?;
    Ok(SeriesWindow {
        exchange: resolve_exchange(exchange_override, config)?,
        start,
        end,
    })
}

pub fn build_fix_job(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
    exchange_override: Option<&str>,
) -> Result<FixJob, GridfixError> {
    let formula = match symbol_override {
        Some(symbol) => Expr::Symbol(symbol.to_string()),
        None => grid_formula(config)?,
    };
    Ok(FixJob {
        formula,
        trend: grid_trend(config)?,
        grid: grid_config_from(config)?,
        window: series_window(exchange_override, config)?,
    })
}

fn data_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, GridfixError> {
    let path = config
        .get_string("data", "path")
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| GridfixError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    Ok(CsvAdapter::new(PathBuf::from(path)))
}

fn output_path(output: Option<&Path>, config: &dyn ConfigPort, default: &str) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "output").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Load the series, run the simulator and write the curve.
pub fn run_fix_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    job: &FixJob,
    output: &Path,
) -> Result<(GridRun, RunMetrics), GridfixError> {
    tracing::info!(formula = %job.formula, exchange = %job.window.exchange, "loading series");
    let spread = build_spread(data_port, &job.formula, job.trend.as_ref(), &job.window)?;
    let ticks = spread.to_ticks()?;

    tracing::info!(ticks = ticks.len(), side = %job.grid.side, "running grid");
    let run = run_grid(&ticks, &job.grid)?;
    let metrics = RunMetrics::compute(&run);

    report_port.write_curve(&run.curve, output)?;
    tracing::info!(path = %output.display(), "curve written");
    Ok((run, metrics))
}

fn print_summary(job: &FixJob, run: &GridRun, metrics: &RunMetrics) {
    eprintln!("\n=== Grid Results ===");
    eprintln!("Formula:          {}", job.formula);
    if let Some(trend) = &job.trend {
        eprintln!("Trend:            {} (width {})", trend, job.grid.width);
    }
    eprintln!("Side:             {}", job.grid.side);
    eprintln!("Ticks:            {}", metrics.ticks);
    eprintln!("Final Reval:      {:.2}", metrics.final_reval);
    eprintln!("Final Fix:        {:.2}", metrics.final_fix);
    eprintln!("Max Drawdown:     {:.2}", metrics.max_drawdown);
    eprintln!("Fills:            {}", metrics.fills);
    eprintln!("Closes:           {}", metrics.closes);
    eprintln!("Liquidations:     {}", metrics.liquidations);
    eprintln!("Max |Position|:   {}", metrics.max_abs_position);
    eprintln!("Fees:             {:.2}", metrics.fee);
    eprintln!("Termination:      {:?}", metrics.termination);
    if let Some(ts) = run.last_timestamp {
        eprintln!("Last Timestamp:   {}", ts);
    }
}

fn run_fix(
    config_path: &Path,
    output: Option<&Path>,
    symbol_override: Option<&str>,
    exchange_override: Option<&str>,
) -> ExitCode {
    // Stage 1: Load config
    tracing::info!(path = %config_path.display(), "loading config");
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate
    if let Err(e) = validate_data_config(&adapter).and_then(|_| validate_grid_config(&adapter)) {
        return report_error(e);
    }

    // Stage 3: Build job
    let job = match build_fix_job(&adapter, symbol_override, exchange_override) {
        Ok(j) => j,
        Err(e) => return report_error(e),
    };
    let data_port = match data_adapter(&adapter) {
        Ok(d) => d,
        Err(e) => return report_error(e),
    };
    let output = output_path(output, &adapter, "fix.csv");

    // Stage 4: Simulate and report
    match run_fix_pipeline(&data_port, &CsvReportAdapter, &job, &output) {
        Ok((run, metrics)) => {
            print_summary(&job, &run, &metrics);
            eprintln!("\nCurve written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}

/// Evaluate the formula and run the rebalancing walk over it.
pub fn run_rebalance_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    formula: &Expr,
    window: &SeriesWindow,
    amount: f64,
    rebalance_days: i64,
    output: &Path,
) -> Result<Vec<EquityPoint>, GridfixError> {
    let spread = build_spread(data_port, formula, None, window)?;
    let curve = rebalance_amount(&spread.points, amount, rebalance_days)?;
    report_port.write_equity(&curve, output)?;
    Ok(curve)
}

fn run_rebalance(config_path: &Path, output: Option<&Path>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let prepared = validate_data_config(&adapter)
        .and_then(|_| validate_rebalance_config(&adapter))
        .and_then(|_| {
            Ok((
                grid_formula(&adapter)?,
                series_window(None, &adapter)?,
                rebalance_params(&adapter)?,
                data_adapter(&adapter)?,
            ))
        });
    let (formula, window, (amount, days), data_port) = match prepared {
        Ok(p) => p,
        Err(e) => return report_error(e),
    };
    let output = output_path(output, &adapter, "rebalance.csv");

    match run_rebalance_pipeline(
        &data_port,
        &CsvReportAdapter,
        &formula,
        &window,
        amount,
        days,
        &output,
    ) {
        Ok(curve) => {
            eprintln!("\n=== Rebalance Results ===");
            eprintln!("Formula:          {}", formula);
            eprintln!("Amount:           {:.2}", amount);
            eprintln!("Rebalance Days:   {}", days);
            if let Some(last) = curve.last() {
                eprintln!("Final Equity:     {:.2}", last.equity);
            }
            eprintln!("\nEquity written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}

fn run_risk(work_range: f64, step: f64, stop_range: f64, qty_per_level: f64) -> ExitCode {
    match grid_risk(work_range, step, stop_range, qty_per_level) {
        Ok(risk) => {
            println!("{}", risk);
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    tracing::info!(path = %config_path.display(), "loading config");
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_data_config(&adapter).and_then(|_| validate_grid_config(&adapter)) {
        return report_error(e);
    }
    eprintln!("Config validated successfully");

    let job = match build_fix_job(&adapter, None, None) {
        Ok(j) => j,
        Err(e) => return report_error(e),
    };
    let schema = match job.grid.resolve_schema() {
        Ok(s) => s,
        Err(e) => return report_error(e),
    };

    eprintln!("\nSeries:");
    eprintln!("  formula: {}", job.formula);
    eprintln!("  symbols: {}", job.formula.symbols().join(", "));
    if let Some(trend) = &job.trend {
        eprintln!("  trend:   {}", trend);
    }
    eprintln!("  exchange: {}", job.window.exchange);

    eprintln!("\nGrid:");
    eprintln!("  side:  {}", job.grid.side);
    eprintln!("  steps: {}", schema);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    for key in ["formula", "trend"] {
        if let Some(source) = adapter
            .get_string("grid", key)
            .filter(|s| !s.trim().is_empty())
        {
            eprintln!("\n{}:", key);
            match crate::domain::formula_parser::parse(&source) {
                Ok(expr) => {
                    eprintln!("  Parsed: {}", expr);
                    eprintln!("  Raw:    {}", source);
                }
                Err(e) => {
                    eprintln!("  error: {}", e.display_with_context(&source));
                    return (&GridfixError::from(e)).into();
                }
            }
        }
    }

    if let Err(e) = validate_data_config(&adapter).and_then(|_| validate_grid_config(&adapter)) {
        return report_error(e);
    }
    if let Err(e) = rebalance_params(&adapter) {
        return report_error(e);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path, exchange_override: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let listed = resolve_exchange(exchange_override, &config).and_then(|exchange| {
        let symbols = data_adapter(&config)?.list_symbols(&exchange)?;
        Ok((exchange, symbols))
    });

    match listed {
        Ok((exchange, symbols)) => {
            if symbols.is_empty() {
                eprintln!("No symbols found for exchange {}", exchange);
            } else {
                for symbol in &symbols {
                    println!("{}", symbol);
                }
                eprintln!("{} symbols found", symbols.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}

fn run_info(config_path: &Path, symbol: &str, exchange_override: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let range = resolve_exchange(exchange_override, &config).and_then(|exchange| {
        let range = data_adapter(&config)?.get_data_range(symbol, &exchange)?;
        Ok((exchange, range))
    });

    match range {
        Ok((exchange, Some((first, last, count)))) => {
            println!("{}.{}: {} rows, {} to {}", symbol, exchange, count, first, last);
            ExitCode::SUCCESS
        }
        Ok((exchange, None)) => {
            eprintln!("{}.{}: no data found", symbol, exchange);
            ExitCode::SUCCESS
        }
        Err(e) => report_error(e),
    }
}
