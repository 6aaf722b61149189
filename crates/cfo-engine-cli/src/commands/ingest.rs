use clap::Args;
use serde_json::Value;

use cfo_engine_core::ingest::{normalize, NormalizeInput};

use super::StatementArg;
use crate::input;

/// Arguments for raw table normalization
#[derive(Args)]
pub struct NormalizeArgs {
    /// Raw table: CSV, or JSON/YAML with {columns, rows} or an array of records
    #[arg(long)]
    pub table: Option<String>,

    /// Statement the table should be read as
    #[arg(long, value_enum)]
    pub statement: StatementArg,
}

pub fn run_normalize(args: NormalizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let table = if let Some(ref path) = args.table {
        input::file::read_table(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        input::file::table_from_value(data)?
    } else {
        return Err("--table <file> or stdin required for normalization".into());
    };

    let input = NormalizeInput {
        table,
        statement: args.statement.into(),
        source_id: None,
    };
    let result = normalize(&input)?;
    Ok(serde_json::to_value(result)?)
}
