pub mod analysis;
pub mod dispatch;
pub mod fpa;
pub mod ingest;
pub mod investment;
pub mod scenarios;
pub mod statements;

use cfo_engine_core::ingest::{normalize_table, StatementKind};
use cfo_engine_core::TimeSeries;
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::input;

/// Typed input from `--input <file>` or piped stdin.
pub fn load_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        debug!(path, "reading input file");
        input::file::read_structured(path)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("--input <file.json> or stdin required for {what}").into())
    }
}

/// Normalize a raw table file (CSV, JSON or YAML) into a statement series.
pub fn load_statement(path: &str, kind: StatementKind) -> Result<TimeSeries, Box<dyn std::error::Error>> {
    let table = input::file::read_table(path)?;
    let dataset = normalize_table(&table, kind)?;
    for warning in &dataset.warnings {
        tracing::warn!(path, "{warning}");
    }
    Ok(dataset.series)
}

/// Statement type as a command-line value.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatementArg {
    CashFlow,
    Pnl,
    BalanceSheet,
}

impl From<StatementArg> for StatementKind {
    fn from(arg: StatementArg) -> Self {
        match arg {
            StatementArg::CashFlow => StatementKind::CashFlow,
            StatementArg::Pnl => StatementKind::ProfitAndLoss,
            StatementArg::BalanceSheet => StatementKind::BalanceSheet,
        }
    }
}
