use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EngineError;
use crate::series::{Row, TimeSeries};
use crate::types::{with_metadata, ComputationOutput, Figure};
use crate::EngineResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthInput {
    pub data: TimeSeries,
    /// Restrict to these fields; every field when empty
    #[serde(default)]
    pub fields: Vec<String>,
}

pub fn analyze_growth(input: &GrowthInput) -> EngineResult<ComputationOutput<TimeSeries>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if input.data.len() < 2 {
        warnings.push("Fewer than 2 periods; every growth rate is undefined".to_string());
    }
    for field in &input.fields {
        if !input.data.has_field(field) {
            return Err(EngineError::validation(
                field.clone(),
                "Field is not present in the series",
            ));
        }
    }

    let growth = period_over_period_growth(&input.data, &input.fields);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Period-over-period growth: (x_t - x_{t-1}) / x_{t-1}",
        &serde_json::json!({
            "periods": input.data.len(),
            "fields": input.fields,
        }),
        warnings,
        elapsed,
        growth,
    ))
}

/// Growth of each field relative to the previous period. The first period
/// and any period with a zero or missing prior value is `Undefined`.
pub fn period_over_period_growth(series: &TimeSeries, only: &[String]) -> TimeSeries {
    let selected: Vec<String> = if only.is_empty() {
        series.fields().into_iter().collect()
    } else {
        only.to_vec()
    };

    let mut out = TimeSeries::new();
    let mut prior: Option<&Row> = None;
    for (period, row) in series.rows() {
        out.ensure_period(*period);
        for field in &selected {
            let Some(current) = row.get(field) else {
                continue;
            };
            let previous = prior
                .and_then(|r| r.get(field).copied())
                .unwrap_or(Figure::Undefined);
            out.insert(*period, field.clone(), Figure::pct_change(*current, previous));
        }
        prior = Some(row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::series::Period;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quarterly_revenue_growth() {
        let mut ts = TimeSeries::new();
        for (i, rev) in [dec!(100000), dec!(120000), dec!(150000), dec!(180000)]
            .into_iter()
            .enumerate()
        {
            ts.insert(Period::Index(i as u32 + 1), fields::REVENUE, rev);
        }
        let g = period_over_period_growth(&ts, &[]);
        assert!(g.figure(&Period::Index(1), fields::REVENUE).is_undefined());
        assert_eq!(g.get(&Period::Index(2), fields::REVENUE), Some(Figure::Value(dec!(0.2))));
        assert_eq!(g.get(&Period::Index(3), fields::REVENUE), Some(Figure::Value(dec!(0.25))));
        assert_eq!(g.get(&Period::Index(4), fields::REVENUE), Some(Figure::Value(dec!(0.2))));
    }

    #[test]
    fn test_zero_prior_is_undefined() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::NET_INCOME, dec!(0));
        ts.insert(Period::Index(2), fields::NET_INCOME, dec!(50));
        let g = period_over_period_growth(&ts, &[]);
        assert_eq!(g.get(&Period::Index(2), fields::NET_INCOME), Some(Figure::Undefined));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let input = GrowthInput {
            data: TimeSeries::new(),
            fields: vec!["headcount".into()],
        };
        assert!(analyze_growth(&input).is_err());
    }
}
