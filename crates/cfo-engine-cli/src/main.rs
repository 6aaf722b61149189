mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cfo_engine_core::EngineConfig;

use commands::analysis::{GrowthArgs, KeyMetricsArgs, RatiosArgs};
use commands::dispatch::DispatchArgs;
use commands::fpa::{BreakEvenArgs, VarianceArgs};
use commands::ingest::NormalizeArgs;
use commands::investment::InvestmentArgs;
use commands::scenarios::ScenariosArgs;
use commands::statements::{BalanceSheetArgs, CashFlowArgs, PnlArgs};

/// Virtual CFO financial computations
#[derive(Parser)]
#[command(
    name = "vcfo",
    version,
    about = "Virtual CFO financial computations",
    long_about = "A CLI for normalizing raw financial tables and running statement, \
                  ratio, scenario, variance, investment and break-even analysis \
                  with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a raw table onto canonical statement fields
    Normalize(NormalizeArgs),
    /// Project cash flows forward with per-category growth
    CashFlow(CashFlowArgs),
    /// Build a profit & loss statement
    Pnl(PnlArgs),
    /// Balance sheet totals, working capital and comparisons
    BalanceSheet(BalanceSheetArgs),
    /// Profitability, liquidity, efficiency, leverage and valuation ratios
    Ratios(RatiosArgs),
    /// Probability-weighted scenario analysis
    Scenarios(ScenariosArgs),
    /// Actual vs budget variance
    Variance(VarianceArgs),
    /// NPV, IRR, payback and profitability index
    Investment(InvestmentArgs),
    /// Break-even volume, margin of safety and cost-volume-profit curve
    BreakEven(BreakEvenArgs),
    /// Period-over-period growth rates
    Growth(GrowthArgs),
    /// Headline metrics for the latest period
    KeyMetrics(KeyMetricsArgs),
    /// Execute a {"intent", "parameters"} request
    Dispatch(DispatchArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    // Priority: RUST_LOG > --verbose > warnings only
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn load_config(path: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(EngineConfig::from_path(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Normalize(args) => commands::ingest::run_normalize(args),
        Commands::CashFlow(args) => commands::statements::run_cash_flow(args, &config),
        Commands::Pnl(args) => commands::statements::run_pnl(args),
        Commands::BalanceSheet(args) => commands::statements::run_balance_sheet(args),
        Commands::Ratios(args) => commands::analysis::run_ratios(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args, &config),
        Commands::Variance(args) => commands::fpa::run_variance(args, &config),
        Commands::Investment(args) => commands::investment::run_investment(args, &config),
        Commands::BreakEven(args) => commands::fpa::run_break_even(args, &config),
        Commands::Growth(args) => commands::analysis::run_growth(args),
        Commands::KeyMetrics(args) => commands::analysis::run_key_metrics(args),
        Commands::Dispatch(args) => commands::dispatch::run_dispatch(args, &config),
        Commands::Version => {
            println!("vcfo {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            // A dispatch failure is still printed as a response
            let failed = value.get("status").and_then(|s| s.as_str()) == Some("failure");
            process::exit(if failed { 1 } else { 0 });
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
