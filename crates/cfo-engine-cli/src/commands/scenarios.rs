use clap::Args;
use serde_json::Value;

use cfo_engine_core::scenarios::{analyze_scenarios, ScenarioAnalysisInput};
use cfo_engine_core::EngineConfig;

use super::{load_input, load_statement};

/// Arguments for probability-weighted scenario analysis
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to JSON/YAML input file ({model, data, scenarios, metrics, ...})
    #[arg(long)]
    pub input: Option<String>,

    /// Raw table supplying `data`, normalized as the input's model statement
    #[arg(long)]
    pub data: Option<String>,
}

pub fn run_scenarios(args: ScenariosArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let mut raw: Value = load_input(args.input.as_deref(), "scenario analysis")?;
    if let Some(ref path) = args.data {
        let model = raw
            .get("model")
            .cloned()
            .ok_or("`model` is required in the input when --data is given")?;
        let series = load_statement(path, serde_json::from_value(model)?)?;
        if let Some(obj) = raw.as_object_mut() {
            obj.insert("data".to_string(), serde_json::to_value(series)?);
        }
    }
    let sc_input: ScenarioAnalysisInput = serde_json::from_value(raw)?;
    let result = analyze_scenarios(&sc_input, config)?;
    Ok(serde_json::to_value(result)?)
}
