use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cfo_engine_core::investment::{analyze_investment, InvestmentInput};
use cfo_engine_core::EngineConfig;

use super::load_input;

/// Arguments for capital budgeting (NPV, IRR, payback)
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct InvestmentArgs {
    /// Amount spent at t = 0
    #[arg(long)]
    pub initial_investment: Option<Decimal>,

    /// Period cash flows, comma separated (e.g. 30000,30000,30000)
    #[arg(long, value_delimiter = ',')]
    pub cash_flows: Vec<Decimal>,

    /// Per-period discount rate (e.g. 0.10)
    #[arg(long)]
    pub discount_rate: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_investment(args: InvestmentArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let inv_input: InvestmentInput = if args.input.is_some() || args.initial_investment.is_none() {
        load_input(args.input.as_deref(), "investment analysis")?
    } else {
        if args.cash_flows.is_empty() {
            return Err("--cash-flows is required (or provide --input)".into());
        }
        InvestmentInput {
            initial_investment: args
                .initial_investment
                .ok_or("--initial-investment is required (or provide --input)")?,
            cash_flows: args.cash_flows,
            discount_rate: args
                .discount_rate
                .ok_or("--discount-rate is required (or provide --input)")?,
        }
    };
    let result = analyze_investment(&inv_input, config)?;
    Ok(serde_json::to_value(result)?)
}
