use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cfo_engine_core::fpa::{analyze_break_even, analyze_variance, BreakEvenInput, VarianceInput};
use cfo_engine_core::ingest::StatementKind;
use cfo_engine_core::EngineConfig;

use super::{load_input, load_statement};

/// Arguments for actual-vs-budget variance analysis
#[derive(Args)]
pub struct VarianceArgs {
    /// Path to JSON/YAML input file ({actual, budget, threshold})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw actuals table (income layout) to normalize instead of --input
    #[arg(long, requires = "budget", conflicts_with = "input")]
    pub actual: Option<String>,

    /// Raw budget table (income layout)
    #[arg(long, requires = "actual")]
    pub budget: Option<String>,

    /// Significance threshold as a rate (e.g. 0.05); configured default otherwise
    #[arg(long)]
    pub threshold: Option<Decimal>,
}

/// Arguments for break-even analysis
#[derive(Args)]
pub struct BreakEvenArgs {
    /// Total fixed costs
    #[arg(long)]
    pub fixed_costs: Option<Decimal>,

    /// Selling price per unit
    #[arg(long)]
    pub unit_price: Option<Decimal>,

    /// Variable cost per unit
    #[arg(long)]
    pub variable_cost: Option<Decimal>,

    /// Current units sold (margin of safety, operating leverage)
    #[arg(long)]
    pub current_volume: Option<Decimal>,

    /// Profit target for the target-volume calculation
    #[arg(long)]
    pub target_profit: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_variance(args: VarianceArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let mut var_input: VarianceInput = match (&args.actual, &args.budget) {
        (Some(actual), Some(budget)) => VarianceInput {
            actual: load_statement(actual, StatementKind::ProfitAndLoss)?,
            budget: load_statement(budget, StatementKind::ProfitAndLoss)?,
            threshold: None,
        },
        _ => load_input(args.input.as_deref(), "variance analysis")?,
    };
    if args.threshold.is_some() {
        var_input.threshold = args.threshold;
    }
    let result = analyze_variance(&var_input, config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_break_even(args: BreakEvenArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let be_input: BreakEvenInput = if args.input.is_some() || args.fixed_costs.is_none() {
        load_input(args.input.as_deref(), "break-even analysis")?
    } else {
        BreakEvenInput {
            fixed_costs: args
                .fixed_costs
                .ok_or("--fixed-costs is required (or provide --input)")?,
            unit_price: args
                .unit_price
                .ok_or("--unit-price is required (or provide --input)")?,
            variable_cost: args
                .variable_cost
                .ok_or("--variable-cost is required (or provide --input)")?,
            current_volume: args.current_volume,
            target_profit: args.target_profit,
            curve_steps: None,
        }
    };
    let result = analyze_break_even(&be_input, config)?;
    Ok(serde_json::to_value(result)?)
}
