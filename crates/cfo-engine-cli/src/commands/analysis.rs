use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cfo_engine_core::analysis::{
    analyze_growth, compute_ratios, key_metrics, GrowthInput, KeyMetricsInput, RatioInput,
};
use cfo_engine_core::ingest::StatementKind;

use super::{load_input, load_statement};

/// Arguments for financial ratio analysis
#[derive(Args)]
pub struct RatiosArgs {
    /// Path to JSON/YAML input file ({income, balance, cash_flow, market_cap})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw income table
    #[arg(long, requires = "balance_csv", conflicts_with = "input")]
    pub income_csv: Option<String>,

    /// Raw balance sheet table
    #[arg(long, requires = "income_csv")]
    pub balance_csv: Option<String>,

    /// Raw cash flow table, used for EBITDA depreciation
    #[arg(long, requires = "income_csv")]
    pub cash_flow_csv: Option<String>,

    /// Market capitalisation applied to every period
    #[arg(long)]
    pub market_cap: Option<Decimal>,
}

/// Arguments for period-over-period growth
#[derive(Args)]
pub struct GrowthArgs {
    /// Path to JSON/YAML input file ({data, fields})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw income table to normalize instead of --input
    #[arg(long, conflicts_with = "input")]
    pub csv: Option<String>,

    /// Restrict to these fields (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,
}

/// Arguments for headline key metrics
#[derive(Args)]
pub struct KeyMetricsArgs {
    /// Path to JSON/YAML input file ({income, balance})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw income table
    #[arg(long, requires = "balance_csv", conflicts_with = "input")]
    pub income_csv: Option<String>,

    /// Raw balance sheet table
    #[arg(long, requires = "income_csv")]
    pub balance_csv: Option<String>,
}

pub fn run_ratios(args: RatiosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut ratio_input: RatioInput = match (&args.income_csv, &args.balance_csv) {
        (Some(income), Some(balance)) => RatioInput {
            income: load_statement(income, StatementKind::ProfitAndLoss)?,
            balance: load_statement(balance, StatementKind::BalanceSheet)?,
            cash_flow: args
                .cash_flow_csv
                .as_deref()
                .map(|path| load_statement(path, StatementKind::CashFlow))
                .transpose()?,
            market_cap: None,
        },
        _ => load_input(args.input.as_deref(), "ratio analysis")?,
    };
    if args.market_cap.is_some() {
        ratio_input.market_cap = args.market_cap;
    }
    let result = compute_ratios(&ratio_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_growth(args: GrowthArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut growth_input: GrowthInput = match args.csv {
        Some(ref path) => GrowthInput {
            data: load_statement(path, StatementKind::ProfitAndLoss)?,
            fields: Vec::new(),
        },
        None => load_input(args.input.as_deref(), "growth analysis")?,
    };
    if !args.fields.is_empty() {
        growth_input.fields = args.fields;
    }
    let result = analyze_growth(&growth_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_key_metrics(args: KeyMetricsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let km_input: KeyMetricsInput = match (&args.income_csv, &args.balance_csv) {
        (Some(income), Some(balance)) => KeyMetricsInput {
            income: load_statement(income, StatementKind::ProfitAndLoss)?,
            balance: load_statement(balance, StatementKind::BalanceSheet)?,
        },
        _ => load_input(args.input.as_deref(), "key metrics")?,
    };
    let result = key_metrics(&km_input)?;
    Ok(serde_json::to_value(result)?)
}
