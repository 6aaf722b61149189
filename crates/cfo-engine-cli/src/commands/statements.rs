use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use cfo_engine_core::ingest::StatementKind;
use cfo_engine_core::statements::{
    analyze_balance_sheet, build_profit_and_loss, project_cash_flow, BalanceSheetInput, CashFlowInput,
    Granularity, ProfitLossInput,
};
use cfo_engine_core::{EngineConfig, GrowthAssumptions};

use super::{load_input, load_statement};

/// Arguments for cash flow projection
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct CashFlowArgs {
    /// Path to JSON/YAML input file ({data, periods, growth})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw historical table to normalize instead of --input
    #[arg(long, conflicts_with = "input")]
    pub csv: Option<String>,

    /// Projection horizon when reading --csv
    #[arg(long, default_value_t = 12)]
    pub periods: u32,

    /// Growth rate for every category when reading --csv (configured default otherwise)
    #[arg(long)]
    pub growth_rate: Option<Decimal>,
}

/// Arguments for profit & loss construction
#[derive(Args)]
pub struct PnlArgs {
    /// Path to JSON/YAML input file ({data, granularity})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw income table to normalize instead of --input
    #[arg(long, conflicts_with = "input")]
    pub csv: Option<String>,

    /// Aggregation bucket when reading --csv
    #[arg(long, value_enum)]
    pub granularity: Option<Bucket>,
}

/// Arguments for balance sheet analysis
#[derive(Args)]
pub struct BalanceSheetArgs {
    /// Path to JSON/YAML input file ({data, comparative})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw balance sheet table to normalize instead of --input
    #[arg(long, conflicts_with = "input")]
    pub csv: Option<String>,

    /// Add period-over-period percentage columns when reading --csv
    #[arg(long)]
    pub comparative: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Bucket {
    Monthly,
    Quarterly,
    Annual,
}

impl From<Bucket> for Granularity {
    fn from(b: Bucket) -> Self {
        match b {
            Bucket::Monthly => Granularity::Monthly,
            Bucket::Quarterly => Granularity::Quarterly,
            Bucket::Annual => Granularity::Annual,
        }
    }
}

pub fn run_cash_flow(args: CashFlowArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let cf_input: CashFlowInput = match args.csv {
        Some(ref path) => CashFlowInput {
            data: load_statement(path, StatementKind::CashFlow)?,
            periods: args.periods,
            growth: args.growth_rate.map(GrowthAssumptions::uniform),
        },
        None => load_input(args.input.as_deref(), "cash flow projection")?,
    };
    let result = project_cash_flow(&cf_input, config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_pnl(args: PnlArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let pnl_input: ProfitLossInput = match args.csv {
        Some(ref path) => ProfitLossInput {
            data: load_statement(path, StatementKind::ProfitAndLoss)?,
            granularity: args.granularity.map(Granularity::from),
        },
        None => load_input(args.input.as_deref(), "profit & loss")?,
    };
    let result = build_profit_and_loss(&pnl_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_balance_sheet(args: BalanceSheetArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bs_input: BalanceSheetInput = match args.csv {
        Some(ref path) => BalanceSheetInput {
            data: load_statement(path, StatementKind::BalanceSheet)?,
            comparative: args.comparative,
        },
        None => load_input(args.input.as_deref(), "balance sheet analysis")?,
    };
    let result = analyze_balance_sheet(&bs_input)?;
    Ok(serde_json::to_value(result)?)
}
