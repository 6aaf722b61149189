use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::registry::IntentKind;
use crate::analysis::{analyze_growth, compute_ratios, key_metrics, GrowthInput, KeyMetricsInput, RatioInput};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fpa::{analyze_break_even, analyze_variance, BreakEvenInput, VarianceInput};
use crate::ingest::{normalize, DatasetCache, NormalizeInput};
use crate::investment::{analyze_investment, InvestmentInput};
use crate::scenarios::{analyze_scenarios, ScenarioAnalysisInput};
use crate::series::UndefinedCell;
use crate::statements::{
    analyze_balance_sheet, build_profit_and_loss, project_cash_flow, BalanceSheetInput, CashFlowInput,
    ProfitLossInput,
};
use crate::types::ComputationOutput;
use crate::EngineResult;

/// A resolved intent with its typed parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "intent", content = "parameters", rename_all = "snake_case")]
pub enum Intent {
    NormalizeData(NormalizeInput),
    ProjectCashFlow(CashFlowInput),
    BuildProfitAndLoss(ProfitLossInput),
    AnalyzeBalanceSheet(BalanceSheetInput),
    ComputeRatios(RatioInput),
    RunScenarios(ScenarioAnalysisInput),
    AnalyzeVariance(VarianceInput),
    AnalyzeInvestment(InvestmentInput),
    AnalyzeBreakEven(BreakEvenInput),
    AnalyzeGrowth(GrowthInput),
    KeyMetrics(KeyMetricsInput),
}

/// What a successful execution hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The serialized computation envelope
    pub result: Value,
    /// Inputs left out of the computation, when any were
    pub excluded: Option<Value>,
    pub undefined: Vec<UndefinedCell>,
}

impl Outcome {
    fn of<T: Serialize>(output: &ComputationOutput<T>) -> EngineResult<Self> {
        Ok(Outcome {
            result: serde_json::to_value(output)?,
            excluded: None,
            undefined: Vec::new(),
        })
    }

    fn undefined(mut self, cells: Vec<UndefinedCell>) -> Self {
        self.undefined = cells;
        self
    }

    fn excluded<E: Serialize>(mut self, excluded: &E, empty: bool) -> EngineResult<Self> {
        if !empty {
            self.excluded = Some(serde_json::to_value(excluded)?);
        }
        Ok(self)
    }
}

impl Intent {
    /// Build the typed intent from raw parameters. Any shape or type problem
    /// is a validation failure.
    pub fn from_parameters(kind: IntentKind, parameters: Map<String, Value>) -> EngineResult<Self> {
        let tagged = serde_json::json!({
            "intent": kind,
            "parameters": Value::Object(parameters),
        });
        serde_json::from_value(tagged).map_err(|e| EngineError::validation("parameters", e.to_string()))
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::NormalizeData(_) => IntentKind::NormalizeData,
            Intent::ProjectCashFlow(_) => IntentKind::ProjectCashFlow,
            Intent::BuildProfitAndLoss(_) => IntentKind::BuildProfitAndLoss,
            Intent::AnalyzeBalanceSheet(_) => IntentKind::AnalyzeBalanceSheet,
            Intent::ComputeRatios(_) => IntentKind::ComputeRatios,
            Intent::RunScenarios(_) => IntentKind::RunScenarios,
            Intent::AnalyzeVariance(_) => IntentKind::AnalyzeVariance,
            Intent::AnalyzeInvestment(_) => IntentKind::AnalyzeInvestment,
            Intent::AnalyzeBreakEven(_) => IntentKind::AnalyzeBreakEven,
            Intent::AnalyzeGrowth(_) => IntentKind::AnalyzeGrowth,
            Intent::KeyMetrics(_) => IntentKind::KeyMetrics,
        }
    }

    /// Run the component behind this intent.
    pub fn execute(&self, config: &EngineConfig, cache: Option<&DatasetCache>) -> EngineResult<Outcome> {
        match self {
            Intent::NormalizeData(input) => {
                let out = match cache {
                    Some(cache) => cache.normalize(input)?,
                    None => normalize(input)?,
                };
                let dataset = &out.result;
                let excluded = serde_json::json!({
                    "unmatched_columns": dataset.unmatched_columns,
                    "unparsed_date_columns": dataset.unparsed_date_columns,
                });
                let empty = dataset.unmatched_columns.is_empty() && dataset.unparsed_date_columns.is_empty();
                Outcome::of(&out)?
                    .undefined(dataset.series.undefined_cells())
                    .excluded(&excluded, empty)
            }
            Intent::ProjectCashFlow(input) => {
                let out = project_cash_flow(input, config)?;
                Ok(Outcome::of(&out)?.undefined(out.result.series.undefined_cells()))
            }
            Intent::BuildProfitAndLoss(input) => {
                let out = build_profit_and_loss(input)?;
                Ok(Outcome::of(&out)?.undefined(out.result.statement.undefined_cells()))
            }
            Intent::AnalyzeBalanceSheet(input) => {
                let out = analyze_balance_sheet(input)?;
                Ok(Outcome::of(&out)?.undefined(out.result.statement.undefined_cells()))
            }
            Intent::ComputeRatios(input) => {
                let out = compute_ratios(input)?;
                let report = &out.result;
                Outcome::of(&out)?
                    .undefined(report.undefined.clone())
                    .excluded(&report.excluded, report.excluded.is_empty())
            }
            Intent::RunScenarios(input) => {
                let out = analyze_scenarios(input, config)?;
                Ok(Outcome::of(&out)?.undefined(out.result.weighted.undefined_cells()))
            }
            Intent::AnalyzeVariance(input) => {
                let out = analyze_variance(input, config)?;
                let report = &out.result;
                let undefined = report
                    .lines
                    .iter()
                    .filter(|line| line.variance_pct.is_undefined())
                    .map(|line| UndefinedCell {
                        period: line.period,
                        field: line.metric.clone(),
                    })
                    .collect();
                Outcome::of(&out)?
                    .undefined(undefined)
                    .excluded(&report.excluded, report.excluded.is_empty())
            }
            Intent::AnalyzeInvestment(input) => Outcome::of(&analyze_investment(input, config)?),
            Intent::AnalyzeBreakEven(input) => Outcome::of(&analyze_break_even(input, config)?),
            Intent::AnalyzeGrowth(input) => {
                let out = analyze_growth(input)?;
                Ok(Outcome::of(&out)?.undefined(out.result.undefined_cells()))
            }
            Intent::KeyMetrics(input) => Outcome::of(&key_metrics(input)?),
        }
    }
}
