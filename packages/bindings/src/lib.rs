use napi::Result as NapiResult;
use napi_derive::napi;

use cfo_engine_core::EngineConfig;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn engine_config(config_toml: Option<String>) -> NapiResult<EngineConfig> {
    match config_toml {
        Some(toml) => EngineConfig::from_toml_str(&toml).map_err(to_napi_error),
        None => Ok(EngineConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Execute an `{"intent", "parameters"}` request. Engine failures come back
/// as a failure response, not a thrown error.
#[napi]
pub fn dispatch(request_json: String, config_toml: Option<String>) -> NapiResult<String> {
    let request: serde_json::Value = serde_json::from_str(&request_json).map_err(to_napi_error)?;
    let config = engine_config(config_toml)?;
    let ctx = cfo_engine_core::dispatch::DispatchContext::new(&config);
    let response = cfo_engine_core::dispatch::dispatch_value(request, &ctx);
    serde_json::to_string(&response).map_err(to_napi_error)
}

#[napi]
pub fn list_intents() -> NapiResult<String> {
    let names: Vec<&str> = cfo_engine_core::dispatch::REGISTRY
        .iter()
        .map(|spec| spec.name)
        .collect();
    serde_json::to_string(&names).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[napi]
pub fn normalize_data(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::ingest::NormalizeInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cfo_engine_core::ingest::normalize(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[napi]
pub fn project_cash_flow(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::statements::CashFlowInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cfo_engine_core::statements::project_cash_flow(&input, &EngineConfig::default())
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn build_profit_and_loss(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::statements::ProfitLossInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cfo_engine_core::statements::build_profit_and_loss(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_balance_sheet(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::statements::BalanceSheetInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cfo_engine_core::statements::analyze_balance_sheet(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_ratios(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::analysis::RatioInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cfo_engine_core::analysis::compute_ratios(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_growth(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::analysis::GrowthInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cfo_engine_core::analysis::analyze_growth(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn key_metrics(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::analysis::KeyMetricsInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cfo_engine_core::analysis::key_metrics(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn run_scenarios(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::scenarios::ScenarioAnalysisInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cfo_engine_core::scenarios::analyze_scenarios(&input, &EngineConfig::default())
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// FP&A
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_variance(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::fpa::VarianceInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cfo_engine_core::fpa::analyze_variance(&input, &EngineConfig::default())
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_break_even(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::fpa::BreakEvenInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cfo_engine_core::fpa::analyze_break_even(&input, &EngineConfig::default())
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Investment
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_investment(input_json: String) -> NapiResult<String> {
    let input: cfo_engine_core::investment::InvestmentInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cfo_engine_core::investment::analyze_investment(&input, &EngineConfig::default())
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
