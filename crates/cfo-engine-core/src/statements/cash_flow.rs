use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use crate::config::{EngineConfig, GrowthAssumptions};
use crate::error::{EngineError, OrOverflow};
use crate::fields;
use crate::series::{Period, TimeSeries};
use crate::types::{with_metadata, ComputationOutput, Figure, Money, Rate};
use crate::EngineResult;

/// Components of net cash flow: revenue in, the rest out.
const OUTFLOW_FIELDS: [&str; 3] = [
    fields::COGS,
    fields::OPERATING_EXPENSE,
    fields::CAPITAL_EXPENDITURE,
];

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowInput {
    /// Normalized historical cash-flow series
    pub data: TimeSeries,
    /// Number of periods to project (≥ 1)
    pub periods: u32,
    /// Falls back to the configured assumptions when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth: Option<GrowthAssumptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowProjection {
    /// Projected periods 1..=n with every category plus net and cumulative cash flow
    pub series: TimeSeries,
    /// Historical mean each category was projected from
    pub start_values: BTreeMap<String, Money>,
    /// Growth rate applied to each category
    pub rates: BTreeMap<String, Rate>,
    /// Net-cash-flow components that were not in the history
    pub missing_components: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn project_cash_flow(
    input: &CashFlowInput,
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<CashFlowProjection>> {
    let start = Instant::now();
    let growth = input.growth.as_ref().unwrap_or(&config.growth);
    check_horizon(input.periods, config.max_projection_periods)?;
    let (projection, warnings) = project(&input.data, growth, input.periods)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Compound growth projection from historical mean: value(t) = start * (1 + g)^t",
        &serde_json::json!({
            "history_periods": input.data.len(),
            "projection_periods": input.periods,
            "growth": growth,
        }),
        warnings,
        elapsed,
        projection,
    ))
}

/// Reject horizons outside `1..=max_periods`.
pub fn check_horizon(periods: u32, max_periods: u32) -> EngineResult<()> {
    if periods == 0 {
        return Err(EngineError::validation(
            "periods",
            "Projection horizon must be at least 1 period",
        ));
    }
    if periods > max_periods {
        return Err(EngineError::validation(
            "periods",
            format!("Projection horizon of {periods} exceeds the limit of {max_periods} periods"),
        ));
    }
    Ok(())
}

/// Project every historical category forward `periods` periods.
///
/// Returns the projection and any warnings about categories that could not
/// contribute to net cash flow.
pub fn project(
    history: &TimeSeries,
    growth: &GrowthAssumptions,
    periods: u32,
) -> EngineResult<(CashFlowProjection, Vec<String>)> {
    if periods == 0 {
        return Err(EngineError::validation(
            "periods",
            "Projection horizon must be at least 1 period",
        ));
    }
    if history.is_empty() {
        return Err(EngineError::InsufficientData(
            "Cash flow projection requires at least 1 historical period".into(),
        ));
    }
    growth.validate()?;

    let mut warnings = Vec::new();

    // --- Starting values ---
    let mut start_values: BTreeMap<String, Money> = BTreeMap::new();
    for field in history.fields() {
        if field == fields::NET_CASH_FLOW || field == fields::CUMULATIVE_CASH_FLOW {
            continue;
        }
        match historical_mean(history, &field)? {
            Some(mean) => {
                start_values.insert(field, mean);
            }
            None => warnings.push(format!(
                "'{field}' has no defined historical values and was not projected"
            )),
        }
    }

    if !start_values.contains_key(fields::REVENUE) {
        return Err(EngineError::InsufficientData(
            "No defined historical revenue to project from".into(),
        ));
    }

    let missing_components: Vec<String> = OUTFLOW_FIELDS
        .iter()
        .filter(|f| !start_values.contains_key(**f))
        .map(|f| f.to_string())
        .collect();
    for field in &missing_components {
        warnings.push(format!(
            "'{field}' absent from history; net cash flow is undefined"
        ));
    }

    let rates: BTreeMap<String, Rate> = start_values
        .keys()
        .map(|k| (k.clone(), growth.rate_for(k)))
        .collect();
    let multipliers = rates
        .iter()
        .map(|(k, rate)| Ok((k.as_str(), Decimal::ONE.checked_add(*rate).or_overflow("growth")?)))
        .collect::<EngineResult<BTreeMap<&str, Decimal>>>()?;

    // --- Compound forward ---
    let mut series = TimeSeries::new();
    let mut factors: BTreeMap<&str, Figure> = multipliers
        .keys()
        .map(|k| (*k, Figure::Value(Decimal::ONE)))
        .collect();
    let mut cumulative = Figure::ZERO;

    for t in 1..=periods {
        let period = Period::Index(t);
        for (category, start_value) in &start_values {
            let multiplier = multipliers[category.as_str()];
            let factor = factors
                .get_mut(category.as_str())
                .map(|f| {
                    *f = *f * multiplier;
                    *f
                })
                .unwrap_or(Figure::Undefined);
            series.insert(period, category.clone(), factor * *start_value);
        }

        // An absent component is undefined, so the net is too.
        let outflows: Figure = OUTFLOW_FIELDS
            .iter()
            .map(|f| series.figure(&period, f))
            .sum();
        let net = series.figure(&period, fields::REVENUE) - outflows;
        cumulative = cumulative + net;

        series.insert(period, fields::NET_CASH_FLOW, net);
        series.insert(period, fields::CUMULATIVE_CASH_FLOW, cumulative);
    }

    debug!(
        categories = start_values.len(),
        periods, "projected cash flow"
    );

    Ok((
        CashFlowProjection {
            series,
            start_values,
            rates,
            missing_components,
        },
        warnings,
    ))
}

/// Mean over the periods where the field has a defined value. With one
/// observation this is that value.
fn historical_mean(history: &TimeSeries, field: &str) -> EngineResult<Option<Money>> {
    let values: Vec<Decimal> = history
        .column(field)
        .into_iter()
        .filter_map(|(_, v)| v.value())
        .collect();
    if values.is_empty() {
        return Ok(None);
    }
    let total = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
        .or_overflow(field)?;
    let mean = total
        .checked_div(Decimal::from(values.len()))
        .or_overflow(field)?;
    Ok(Some(mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn history() -> TimeSeries {
        let mut ts = TimeSeries::new();
        for (i, (rev, cogs, opex)) in [
            (dec!(100000), dec!(60000), dec!(25000)),
            (dec!(120000), dec!(70000), dec!(27000)),
            (dec!(150000), dec!(85000), dec!(30000)),
            (dec!(180000), dec!(100000), dec!(33000)),
        ]
        .into_iter()
        .enumerate()
        {
            let p = Period::Index(i as u32 + 1);
            ts.insert(p, fields::REVENUE, rev);
            ts.insert(p, fields::COGS, cogs);
            ts.insert(p, fields::OPERATING_EXPENSE, opex);
        }
        ts
    }

    #[test]
    fn test_projection_from_mean() {
        let growth = GrowthAssumptions::uniform(dec!(0.10));
        let (proj, warnings) = project(&history(), &growth, 2).unwrap();

        assert_eq!(proj.start_values[fields::REVENUE], dec!(137500));
        assert_eq!(
            proj.series.get(&Period::Index(1), fields::REVENUE),
            Some(Figure::Value(dec!(151250)))
        );
        assert_eq!(
            proj.series.get(&Period::Index(2), fields::REVENUE),
            Some(Figure::Value(dec!(166375)))
        );
        // capex was never observed
        assert_eq!(proj.missing_components, vec![fields::CAPITAL_EXPENDITURE.to_string()]);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_net_and_cumulative() {
        let growth = GrowthAssumptions::uniform(dec!(0));
        let mut hist = history();
        for i in 1..=4 {
            hist.insert(Period::Index(i), fields::CAPITAL_EXPENDITURE, dec!(0));
        }
        let (proj, warnings) = project(&hist, &growth, 3).unwrap();
        assert!(warnings.is_empty());
        // 137500 - 78750 - 28750 - 0 = 30000
        let p1 = Period::Index(1);
        let p3 = Period::Index(3);
        assert_eq!(proj.series.get(&p1, fields::NET_CASH_FLOW), Some(Figure::Value(dec!(30000))));
        assert_eq!(
            proj.series.get(&p3, fields::CUMULATIVE_CASH_FLOW),
            Some(Figure::Value(dec!(90000)))
        );
    }

    #[test]
    fn test_absent_component_leaves_net_undefined() {
        let (proj, _) = project(&history(), &GrowthAssumptions::uniform(dec!(0)), 2).unwrap();
        let p2 = Period::Index(2);
        assert!(proj.series.figure(&p2, fields::NET_CASH_FLOW).is_undefined());
        assert!(proj.series.figure(&p2, fields::CUMULATIVE_CASH_FLOW).is_undefined());
        assert_eq!(proj.series.figure(&p2, fields::REVENUE), Figure::Value(dec!(137500)));
    }

    #[test]
    fn test_horizon_above_limit_rejected() {
        let input = CashFlowInput {
            data: history(),
            periods: 601,
            growth: None,
        };
        let err = project_cash_flow(&input, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "periods"));
        assert!(check_horizon(600, 600).is_ok());
        assert!(check_horizon(0, 600).is_err());
    }

    #[test]
    fn test_overflowing_history_is_an_error() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::REVENUE, Decimal::MAX);
        ts.insert(Period::Index(2), fields::REVENUE, Decimal::MAX);
        let err = project(&ts, &GrowthAssumptions::uniform(dec!(0)), 1).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "revenue"));
    }

    #[test]
    fn test_single_period_uses_last_value() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::REVENUE, dec!(500));
        let (proj, _) = project(&ts, &GrowthAssumptions::uniform(dec!(0)), 1).unwrap();
        assert_eq!(proj.start_values[fields::REVENUE], dec!(500));
    }

    #[test]
    fn test_category_rate_overrides_default() {
        let growth = GrowthAssumptions::uniform(dec!(0)).with_rate(fields::COGS, dec!(-0.5));
        let (proj, _) = project(&history(), &growth, 1).unwrap();
        assert_eq!(
            proj.series.get(&Period::Index(1), fields::COGS),
            Some(Figure::Value(dec!(39375)))
        );
        assert_eq!(proj.rates[fields::REVENUE], dec!(0));
    }

    #[test]
    fn test_rate_at_minus_one_rejected() {
        let growth = GrowthAssumptions::uniform(dec!(-1));
        let err = project(&history(), &growth, 3).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_empty_history_insufficient() {
        let err = project(&TimeSeries::new(), &GrowthAssumptions::default(), 3).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(project(&history(), &GrowthAssumptions::default(), 0).is_err());
    }

    #[test]
    fn test_uses_config_growth_when_absent() {
        let input = CashFlowInput {
            data: history(),
            periods: 1,
            growth: None,
        };
        let out = project_cash_flow(&input, &EngineConfig::default()).unwrap();
        // Default revenue growth 5%
        assert_eq!(out.result.rates[fields::REVENUE], dec!(0.05));
        assert_eq!(out.result.series.len(), 1);
    }
}
