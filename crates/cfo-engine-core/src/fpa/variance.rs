use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::series::{Period, TimeSeries};
use crate::types::{with_metadata, ComputationOutput, Figure, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types: variance analysis
// ---------------------------------------------------------------------------

/// Input for actual-vs-budget variance analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceInput {
    pub actual: TimeSeries,
    pub budget: TimeSeries,
    /// Significance threshold as a rate; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Rate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Actual,
    Budget,
}

/// A cell present on one side only, inside the shared periods and fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingCell {
    pub period: Period,
    pub field: String,
    /// Side that has the value
    pub present_in: Side,
}

/// Everything left out of the comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludedSet {
    pub actual_only_periods: Vec<Period>,
    pub budget_only_periods: Vec<Period>,
    pub actual_only_fields: Vec<String>,
    pub budget_only_fields: Vec<String>,
    pub cells: Vec<MissingCell>,
}

impl ExcludedSet {
    pub fn is_empty(&self) -> bool {
        self.actual_only_periods.is_empty()
            && self.budget_only_periods.is_empty()
            && self.actual_only_fields.is_empty()
            && self.budget_only_fields.is_empty()
            && self.cells.is_empty()
    }
}

/// Per-period, per-metric variance detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub period: Period,
    pub metric: String,
    pub actual: Figure,
    pub budget: Figure,
    /// actual - budget
    pub variance: Figure,
    /// variance / budget
    pub variance_pct: Figure,
    /// |variance_pct| > threshold
    pub significant: bool,
}

/// Whole-horizon totals for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTotal {
    pub metric: String,
    pub actual: Figure,
    pub budget: Figure,
    pub variance: Figure,
    pub variance_pct: Figure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceReport {
    pub threshold: Rate,
    pub lines: Vec<VarianceLine>,
    pub totals: Vec<MetricTotal>,
    pub significant_count: usize,
    pub excluded: ExcludedSet,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Strict comparison: a deviation exactly at the threshold is not flagged.
fn is_significant(variance_pct: Figure, threshold: Rate) -> bool {
    match variance_pct {
        Figure::Value(pct) => pct.abs() > threshold,
        Figure::Undefined => false,
    }
}

fn variance_pair(actual: Figure, budget: Figure) -> (Figure, Figure) {
    let variance = actual - budget;
    (variance, Figure::ratio(variance, budget))
}

fn one_sided<T: Ord + Clone>(left: &BTreeSet<T>, right: &BTreeSet<T>) -> Vec<T> {
    left.difference(right).cloned().collect()
}

// ---------------------------------------------------------------------------
// Function: analyze_variance
// ---------------------------------------------------------------------------

/// Compare actual against budget over the periods and fields both share.
///
/// Partial overlap is never an error; whatever is left out is listed in
/// the report's `excluded` set.
pub fn analyze_variance(
    input: &VarianceInput,
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<VarianceReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let threshold = input.threshold.unwrap_or(config.variance_threshold);
    if threshold < Decimal::ZERO {
        return Err(EngineError::validation(
            "threshold",
            "Significance threshold cannot be negative",
        ));
    }

    // --- Alignment ---
    let actual_periods: BTreeSet<Period> = input.actual.periods().into_iter().collect();
    let budget_periods: BTreeSet<Period> = input.budget.periods().into_iter().collect();
    let actual_fields = input.actual.fields();
    let budget_fields = input.budget.fields();

    let shared_periods: Vec<Period> = actual_periods.intersection(&budget_periods).copied().collect();
    let shared_fields: Vec<String> = actual_fields.intersection(&budget_fields).cloned().collect();

    let mut excluded = ExcludedSet {
        actual_only_periods: one_sided(&actual_periods, &budget_periods),
        budget_only_periods: one_sided(&budget_periods, &actual_periods),
        actual_only_fields: one_sided(&actual_fields, &budget_fields),
        budget_only_fields: one_sided(&budget_fields, &actual_fields),
        cells: Vec::new(),
    };

    if shared_periods.is_empty() || shared_fields.is_empty() {
        warnings.push("Actual and budget share no periods or fields; nothing compared".to_string());
    }

    // --- Line detail ---
    let mut lines = Vec::new();
    for period in &shared_periods {
        for field in &shared_fields {
            let (actual, budget) = match (input.actual.get(period, field), input.budget.get(period, field)) {
                (Some(a), Some(b)) => (a, b),
                (Some(_), None) => {
                    excluded.cells.push(MissingCell {
                        period: *period,
                        field: field.clone(),
                        present_in: Side::Actual,
                    });
                    continue;
                }
                (None, Some(_)) => {
                    excluded.cells.push(MissingCell {
                        period: *period,
                        field: field.clone(),
                        present_in: Side::Budget,
                    });
                    continue;
                }
                (None, None) => continue,
            };

            let (variance, variance_pct) = variance_pair(actual, budget);
            lines.push(VarianceLine {
                period: *period,
                metric: field.clone(),
                actual,
                budget,
                variance,
                variance_pct,
                significant: is_significant(variance_pct, threshold),
            });
        }
    }

    // --- Totals ---
    let totals: Vec<MetricTotal> = shared_fields
        .iter()
        .map(|metric| {
            let of_metric = || lines.iter().filter(move |l| &l.metric == metric);
            let actual: Figure = of_metric().map(|l| l.actual).sum();
            let budget: Figure = of_metric().map(|l| l.budget).sum();
            let (variance, variance_pct) = variance_pair(actual, budget);
            MetricTotal {
                metric: metric.clone(),
                actual,
                budget,
                variance,
                variance_pct,
            }
        })
        .collect();

    if !excluded.is_empty() {
        warnings.push(format!(
            "Excluded from comparison: {} period(s), {} field(s), {} cell(s)",
            excluded.actual_only_periods.len() + excluded.budget_only_periods.len(),
            excluded.actual_only_fields.len() + excluded.budget_only_fields.len(),
            excluded.cells.len()
        ));
    }

    let significant_count = lines.iter().filter(|l| l.significant).count();
    let report = VarianceReport {
        threshold,
        lines,
        totals,
        significant_count,
        excluded,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Actual vs budget variance over shared periods and fields",
        &serde_json::json!({
            "threshold": threshold.to_string(),
            "actual_periods": input.actual.len(),
            "budget_periods": input.budget.len(),
        }),
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
