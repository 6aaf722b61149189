use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::series::{Period, TimeSeries};
use crate::types::*;
use crate::EngineResult;

/// A base model the engine can re-run under different variable overrides.
pub trait ScenarioModel: Sync {
    fn run(&self, overrides: &Overrides) -> EngineResult<TimeSeries>;
}

impl<F> ScenarioModel for F
where
    F: Fn(&Overrides) -> EngineResult<TimeSeries> + Sync,
{
    fn run(&self, overrides: &Overrides) -> EngineResult<TimeSeries> {
        self(overrides)
    }
}

/// Probability and overrides of a scenario keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub probability: Rate,
    #[serde(default, alias = "variable_overrides")]
    pub overrides: Overrides,
}

/// Scenarios as a list of named entries or as `{name: {probability, overrides}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioSet {
    List(Vec<Scenario>),
    Named(BTreeMap<String, ScenarioSpec>),
}

impl ScenarioSet {
    pub fn into_scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioSet::List(list) => list,
            ScenarioSet::Named(map) => map
                .into_iter()
                .map(|(name, spec)| Scenario {
                    name,
                    probability: spec.probability,
                    overrides: spec.overrides,
                })
                .collect(),
        }
    }
}

/// Output of the base model for one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub name: String,
    pub probability: Rate,
    pub series: TimeSeries,
}

/// Side-by-side view of one metric: mean over periods per scenario, and
/// the mean of the probability-weighted series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub metric: String,
    pub per_scenario: BTreeMap<String, Figure>,
    pub weighted: Figure,
}

/// Output of scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub runs: Vec<ScenarioRun>,
    /// Elementwise Σ probability_i × result_i
    pub weighted: TimeSeries,
    pub comparison: Vec<ComparisonRow>,
}

/// Run `model` once per scenario and aggregate the results.
///
/// Runs are independent and execute on the rayon pool when the `parallel`
/// feature is enabled; aggregation starts only after every run returned.
pub fn run_scenarios(
    model: &dyn ScenarioModel,
    scenarios: &[Scenario],
    metrics: &[String],
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_scenarios(scenarios, config.probability_tolerance, &mut warnings)?;

    let results = execute(model, scenarios)?;
    debug!(scenarios = results.len(), "scenario runs complete");

    check_schema(scenarios, &results)?;

    let available = results[0].fields();
    let compared: Vec<String> = if metrics.is_empty() {
        available.iter().cloned().collect()
    } else {
        for metric in metrics {
            if !available.contains(metric) {
                return Err(EngineError::validation(
                    "metrics",
                    format!("Unknown metric '{metric}'; model produces: {}", join(&available)),
                ));
            }
        }
        metrics.to_vec()
    };

    let weighted = weighted_aggregate(scenarios, &results);

    let comparison = compared
        .iter()
        .map(|metric| ComparisonRow {
            metric: metric.clone(),
            per_scenario: scenarios
                .iter()
                .zip(&results)
                .map(|(s, r)| (s.name.clone(), mean_over_periods(r, metric)))
                .collect(),
            weighted: mean_over_periods(&weighted, metric),
        })
        .collect();

    let runs = scenarios
        .iter()
        .zip(results)
        .map(|(s, series)| ScenarioRun {
            name: s.name.clone(),
            probability: s.probability,
            series,
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Probability-weighted scenario analysis",
        &serde_json::json!({
            "num_scenarios": scenarios.len(),
            "metrics": compared,
            "probability_tolerance": config.probability_tolerance.to_string(),
        }),
        warnings,
        elapsed,
        ScenarioOutput {
            runs,
            weighted,
            comparison,
        },
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_scenarios(
    scenarios: &[Scenario],
    tolerance: Decimal,
    warnings: &mut Vec<String>,
) -> EngineResult<()> {
    if scenarios.is_empty() {
        return Err(EngineError::InsufficientData(
            "At least one scenario required".into(),
        ));
    }

    let mut seen = BTreeSet::new();
    for s in scenarios {
        if !seen.insert(s.name.as_str()) {
            return Err(EngineError::validation(
                "scenarios",
                format!("Duplicate scenario name '{}'", s.name),
            ));
        }
        if s.probability < Decimal::ZERO || s.probability > Decimal::ONE {
            return Err(EngineError::validation(
                format!("scenario:{} probability", s.name),
                "Probability must be between 0 and 1",
            ));
        }
    }

    let total: Decimal = scenarios.iter().map(|s| s.probability).sum();
    let gap = (total - Decimal::ONE).abs();
    if gap > tolerance {
        return Err(EngineError::validation(
            "probabilities",
            format!("Probabilities must sum to 1 (got {total})"),
        ));
    }
    if !gap.is_zero() {
        warnings.push(format!(
            "Probabilities sum to {total}; within tolerance, not renormalized"
        ));
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn execute(model: &dyn ScenarioModel, scenarios: &[Scenario]) -> EngineResult<Vec<TimeSeries>> {
    scenarios
        .par_iter()
        .map(|s| model.run(&s.overrides))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn execute(model: &dyn ScenarioModel, scenarios: &[Scenario]) -> EngineResult<Vec<TimeSeries>> {
    scenarios.iter().map(|s| model.run(&s.overrides)).collect()
}

/// Periods and per-period field sets of a series.
fn schema(series: &TimeSeries) -> Vec<(Period, Vec<&String>)> {
    series
        .rows()
        .map(|(p, row)| (*p, row.keys().collect()))
        .collect()
}

fn check_schema(scenarios: &[Scenario], results: &[TimeSeries]) -> EngineResult<()> {
    let reference = schema(&results[0]);
    for (s, r) in scenarios.iter().zip(results).skip(1) {
        let candidate = schema(r);
        if candidate != reference {
            return Err(EngineError::SchemaMismatch(format!(
                "Scenario '{}' produced {} periods / {} fields; '{}' produced {} periods / {} fields",
                s.name,
                r.len(),
                r.fields().len(),
                scenarios[0].name,
                results[0].len(),
                results[0].fields().len(),
            )));
        }
    }
    Ok(())
}

fn weighted_aggregate(scenarios: &[Scenario], results: &[TimeSeries]) -> TimeSeries {
    let mut out = TimeSeries::new();
    for (period, row) in results[0].rows() {
        for field in row.keys() {
            let total: Figure = scenarios
                .iter()
                .zip(results)
                .map(|(s, r)| r.figure(period, field) * s.probability)
                .sum();
            out.insert(*period, field.clone(), total);
        }
    }
    out
}

fn mean_over_periods(series: &TimeSeries, metric: &str) -> Figure {
    let column = series.column(metric);
    if column.is_empty() {
        return Figure::Undefined;
    }
    let total: Figure = column.iter().map(|(_, v)| *v).sum();
    Figure::ratio(total, Figure::Value(Decimal::from(column.len())))
}

fn join(fields: &BTreeSet<String>) -> String {
    fields.iter().cloned().collect::<Vec<_>>().join(", ")
}
