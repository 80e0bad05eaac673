//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{BacktestRequest, BacktestResults, Backtester};
use crate::domain::config_validation::{build_engine_settings, validate_request};
use crate::domain::error::TreeTraderError;
use crate::domain::parser::parse;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "treetrader", about = "Strategy-tree portfolio backtester")]
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
        #[arg(short, long)]
        request: PathBuf,
        /// Report path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse a backtest request and print what the tree needs
    Validate {
        #[arg(short, long)]
        request: PathBuf,
    },
    /// List tickers available in the configured data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            request,
            output,
        } => run_backtest(&config, &request, output.as_deref()),
        Command::Validate { request } => {
            init_logging(None);
            run_validate(&request)
        }
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `[logging] level`.
pub fn init_logging(config: Option<&dyn ConfigPort>) {
    let level = config
        .and_then(|c| c.get_string("logging", "level"))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    // repeated runs in one process keep the first subscriber
    if let Err(e) = installed {
        tracing::debug!(error = %e, "logging already initialised");
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TreeTraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn load_request(path: &Path) -> Result<BacktestRequest, TreeTraderError> {
    let content = fs::read_to_string(path)?;
    let request: BacktestRequest = serde_json::from_str(&content)?;
    validate_request(&request)?;
    Ok(request)
}

pub fn data_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, TreeTraderError> {
    let csv_dir = config.require_string("data", "csv_dir")?;
    Ok(CsvAdapter::new(PathBuf::from(csv_dir)))
}

fn run_backtest(config_path: &Path, request_path: &Path, output_path: Option<&Path>) -> ExitCode {
    // Stage 1: Load config
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging(Some(&config));
    eprintln!("Loading config from {}", config_path.display());

    // Stage 2: Engine settings and data source
    let settings = match build_engine_settings(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let adapter = match data_adapter(&config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Load request
    eprintln!("Loading request from {}", request_path.display());
    let request = match load_request(request_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Run
    let today = chrono::Local::now().date_naive();
    let backtester = Backtester::new(&adapter, settings);
    let results = match backtester.run(&request, today, None) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    print_summary(&results);

    // Stage 5: Report
    let output = output_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    if let Err(e) = JsonReportAdapter.write(&results, &output) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if output != "-" {
        eprintln!("Report written to {}", output);
    }
    ExitCode::SUCCESS
}

fn print_summary(results: &BacktestResults) {
    let m = &results.metrics;
    eprintln!("\nBacktest {} to {}", results.date_from, results.date_to);
    eprintln!("  Starting balance:  {:.2}", results.starting_balance);
    eprintln!("  Ending balance:    {:.2}", results.ending_balance);
    eprintln!("  Cumulative return: {:.2}%", m.cumulative_return);
    eprintln!("  Annualized return: {:.2}%", m.annualized_return);
    eprintln!("  Std deviation:     {:.2}%", m.standard_deviation);
    eprintln!("  Max drawdown:      {:.2}%", m.max_drawdown);
    eprintln!("  Sharpe:            {:.3}", m.sharpe);
    eprintln!("  Calmar:            {:.3}", m.calmar);
    eprintln!("  Trades:            {}", results.trades);
}

fn run_validate(request_path: &Path) -> ExitCode {
    eprintln!("Validating request: {}", request_path.display());
    let request = match load_request(request_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let parsed = match parse(&request.trading_bot) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let join = |set: &std::collections::BTreeSet<String>| {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    eprintln!("\nAssets:           {}", join(&parsed.assets));
    eprintln!("Tradeable:        {}", join(&parsed.tradeable_assets));
    eprintln!("Lookback:         {}", join(&parsed.lookback_assets));
    eprintln!("\nIndicators ({}):", parsed.indicators.len());
    for key in &parsed.indicators {
        eprintln!("  {}", key);
    }
    eprintln!("\nPre-calcs ({}):", parsed.pre_calcs.len());
    for pre_calc in &parsed.pre_calcs {
        eprintln!(
            "  {} {}({}) depth {}",
            pre_calc.node_id, pre_calc.function, pre_calc.window, pre_calc.depth
        );
    }
    eprintln!(
        "\nWindows: indicator {}, pre-calc {}, nesting {}, lookback {} days",
        parsed.largest_indicator_window,
        parsed.largest_pre_calc_window,
        parsed.max_pre_calc_depth,
        parsed.required_lookback()
    );

    eprintln!("\nRequest is valid.");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging(Some(&config));

    let symbols = match data_adapter(&config).and_then(|a| a.list_symbols()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}
