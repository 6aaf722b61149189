use clap::Args;
use serde_json::Value;

use cfo_engine_core::dispatch::{dispatch_value, DispatchContext};
use cfo_engine_core::ingest::{normalize_table, StatementKind};
use cfo_engine_core::EngineConfig;

use super::load_input;
use crate::input;

/// Arguments for intent dispatch
#[derive(Args)]
pub struct DispatchArgs {
    /// Request file: {"intent": "...", "parameters": {...}}
    #[arg(long)]
    pub input: Option<String>,

    /// Raw income table made available to the request
    #[arg(long)]
    pub pnl: Option<String>,

    /// Raw balance sheet table made available to the request
    #[arg(long)]
    pub balance_sheet: Option<String>,

    /// Raw cash flow table made available to the request
    #[arg(long)]
    pub cash_flow: Option<String>,
}

/// Runs one request. Failures are reported in the response body, not as `Err`.
pub fn run_dispatch(args: DispatchArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let request: Value = load_input(args.input.as_deref(), "dispatch")?;

    let mut ctx = DispatchContext::new(config);
    let tables = [
        (&args.pnl, StatementKind::ProfitAndLoss),
        (&args.balance_sheet, StatementKind::BalanceSheet),
        (&args.cash_flow, StatementKind::CashFlow),
    ];
    for (path, kind) in tables {
        if let Some(path) = path {
            let table = input::file::read_table(path)?;
            let dataset = normalize_table(&table, kind)?;
            for warning in &dataset.warnings {
                tracing::warn!(path = path.as_str(), "{warning}");
            }
            ctx = ctx.with_normalized(&dataset);
        }
    }

    let response = dispatch_value(request, &ctx);
    Ok(serde_json::to_value(response)?)
}
