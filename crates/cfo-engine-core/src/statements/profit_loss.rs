use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::EngineError;
use crate::fields;
use crate::series::{Period, Row, TimeSeries};
use crate::types::{with_metadata, ComputationOutput, Figure};
use crate::EngineResult;

/// Expense lines subtracted on the way from revenue to net income. A line
/// missing from a period leaves every derived value below it undefined for
/// that period; it is never taken as zero.
const EXPENSE_FIELDS: [&str; 4] = [
    fields::COGS,
    fields::OPERATING_EXPENSE,
    fields::INTEREST_EXPENSE,
    fields::TAX_EXPENSE,
];

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Monthly,
    Quarterly,
    Annual,
}

impl Granularity {
    /// First day of the bucket containing `date`.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        let month = match self {
            Granularity::Monthly => date.month(),
            Granularity::Quarterly => (date.month0() / 3) * 3 + 1,
            Granularity::Annual => 1,
        };
        // Day 1 of an existing month always exists.
        NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitLossInput {
    /// Normalized income data
    pub data: TimeSeries,
    /// Bucket size; `None` keeps the periods as reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitLossStatement {
    pub granularity: Option<Granularity>,
    pub statement: TimeSeries,
    /// Expense lines absent from the data; the derived lines below them are undefined
    pub missing_lines: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn build_profit_and_loss(input: &ProfitLossInput) -> EngineResult<ComputationOutput<ProfitLossStatement>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let aggregated = match input.granularity {
        Some(g) => {
            let (series, passthrough) = aggregate(&input.data, g);
            if passthrough {
                warnings.push(
                    "Series has no calendar periods; passed through without aggregation".to_string(),
                );
            }
            series
        }
        None => input.data.clone(),
    };

    let (statement, missing_lines) = derive_income(&aggregated)?;
    for field in &missing_lines {
        warnings.push(format!("'{field}' not present in data; derived lines below it are undefined"));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Sum-within-period aggregation; derived lines recomputed from components",
        &serde_json::json!({
            "granularity": input.granularity,
            "input_periods": input.data.len(),
        }),
        warnings,
        elapsed,
        ProfitLossStatement {
            granularity: input.granularity,
            statement,
            missing_lines,
        },
    ))
}

/// Sum every field within each bucket. Returns `true` in the second slot
/// when the series had positional periods and was returned unchanged.
pub fn aggregate(series: &TimeSeries, granularity: Granularity) -> (TimeSeries, bool) {
    if series.periods().iter().any(|p| p.as_date().is_none()) {
        return (series.clone(), true);
    }

    let mut out = TimeSeries::new();
    for (period, row) in series.rows() {
        let Some(date) = period.as_date() else {
            continue;
        };
        let bucket = Period::Date(granularity.bucket_start(date));
        out.ensure_period(bucket);
        for (field, value) in row {
            let summed = match out.get(&bucket, field) {
                Some(existing) => existing + *value,
                None => *value,
            };
            out.insert(bucket, field.clone(), summed);
        }
    }
    debug!(?granularity, from = series.len(), to = out.len(), "aggregated income series");
    (out, false)
}

/// Recompute every derived income line from its components.
///
/// Depreciation is subtracted only when the data reports it as its own
/// line; otherwise operating expense is taken to include it. Any derived
/// values already in the series are overwritten, so passing a built
/// statement back in is idempotent. The second slot lists expense lines
/// absent from every period.
pub fn derive_income(series: &TimeSeries) -> EngineResult<(TimeSeries, Vec<String>)> {
    if !series.has_field(fields::REVENUE) {
        return Err(EngineError::validation(
            fields::REVENUE,
            "Income data has no revenue line",
        ));
    }

    let missing_lines: Vec<String> = EXPENSE_FIELDS
        .iter()
        .filter(|f| !series.has_field(f))
        .map(|f| f.to_string())
        .collect();
    let depreciation_reported = series.has_field(fields::DEPRECIATION);

    let mut out = TimeSeries::new();
    for (period, row) in series.rows() {
        let line = |field: &str| row.get(field).copied().unwrap_or(Figure::Undefined);

        let revenue = line(fields::REVENUE);
        let gross_profit = revenue - line(fields::COGS);
        let mut operating_income = gross_profit - line(fields::OPERATING_EXPENSE);
        if depreciation_reported {
            operating_income = operating_income - line(fields::DEPRECIATION);
        }
        let pretax_income = operating_income - line(fields::INTEREST_EXPENSE);
        let net_income = pretax_income - line(fields::TAX_EXPENSE);

        let mut values: Row = row.clone();
        values.insert(fields::GROSS_PROFIT.into(), gross_profit);
        values.insert(fields::OPERATING_INCOME.into(), operating_income);
        values.insert(fields::PRETAX_INCOME.into(), pretax_income);
        values.insert(fields::NET_INCOME.into(), net_income);
        values.insert(fields::GROSS_MARGIN.into(), Figure::ratio(gross_profit, revenue));
        values.insert(fields::OPERATING_MARGIN.into(), Figure::ratio(operating_income, revenue));
        values.insert(fields::NET_MARGIN.into(), Figure::ratio(net_income, revenue));

        for (field, value) in values {
            out.insert(*period, field, value);
        }
    }
    Ok((out, missing_lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> Period {
        Period::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn monthly_income() -> TimeSeries {
        let mut ts = TimeSeries::new();
        let data = [
            (1, dec!(100), dec!(60)),
            (2, dec!(110), dec!(65)),
            (3, dec!(120), dec!(70)),
            (4, dec!(130), dec!(75)),
        ];
        for (m, rev, cogs) in data {
            ts.insert(day(2024, m, 15), fields::REVENUE, rev);
            ts.insert(day(2024, m, 15), fields::COGS, cogs);
        }
        ts
    }

    #[test]
    fn test_bucket_starts() {
        let d = NaiveDate::from_ymd_opt(2024, 8, 19).unwrap();
        assert_eq!(Granularity::Monthly.bucket_start(d), NaiveDate::from_ymd_opt(2024, 8, 1).unwrap());
        assert_eq!(Granularity::Quarterly.bucket_start(d), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(Granularity::Annual.bucket_start(d), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_quarterly_sums_and_annual_agrees() {
        let (quarterly, _) = aggregate(&monthly_income(), Granularity::Quarterly);
        assert_eq!(quarterly.periods(), vec![day(2024, 1, 1), day(2024, 4, 1)]);
        assert_eq!(quarterly.get(&day(2024, 1, 1), fields::REVENUE), Some(Figure::Value(dec!(330))));

        let (annual, _) = aggregate(&monthly_income(), Granularity::Annual);
        let (annual_from_q, _) = aggregate(&quarterly, Granularity::Annual);
        assert_eq!(annual, annual_from_q);
        assert_eq!(annual.get(&day(2024, 1, 1), fields::REVENUE), Some(Figure::Value(dec!(460))));
    }

    #[test]
    fn test_derived_lines_and_margins() {
        let input = ProfitLossInput {
            data: monthly_income(),
            granularity: Some(Granularity::Quarterly),
        };
        let out = build_profit_and_loss(&input).unwrap();
        let s = &out.result.statement;
        let q1 = day(2024, 1, 1);
        // 330 - 195
        assert_eq!(s.get(&q1, fields::GROSS_PROFIT), Some(Figure::Value(dec!(135))));
        assert_eq!(
            s.get(&q1, fields::GROSS_MARGIN).and_then(|f| f.value()).map(|v| v.round_dp(4)),
            Some(dec!(0.4091))
        );
        // No opex, interest or tax lines: nothing below gross profit is known
        assert_eq!(s.get(&q1, fields::NET_INCOME), Some(Figure::Undefined));
        assert_eq!(out.result.missing_lines.len(), 3);
    }

    #[test]
    fn test_revenue_only_leaves_margins_below_revenue_undefined() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::REVENUE, dec!(1000));
        let out = build_profit_and_loss(&ProfitLossInput {
            data: ts,
            granularity: None,
        })
        .unwrap();
        let s = &out.result.statement;
        let p = Period::Index(1);
        assert_eq!(s.get(&p, fields::GROSS_PROFIT), Some(Figure::Undefined));
        assert_eq!(s.get(&p, fields::OPERATING_INCOME), Some(Figure::Undefined));
        assert_eq!(s.get(&p, fields::NET_INCOME), Some(Figure::Undefined));
        assert_eq!(s.get(&p, fields::NET_MARGIN), Some(Figure::Undefined));
        assert_eq!(out.result.missing_lines.len(), 4);
        assert_eq!(out.warnings.len(), 4);
    }

    #[test]
    fn test_depreciation_subtracted_only_when_reported() {
        let mut ts = TimeSeries::new();
        let p = Period::Index(1);
        ts.insert(p, fields::REVENUE, dec!(1000));
        ts.insert(p, fields::COGS, dec!(400));
        ts.insert(p, fields::OPERATING_EXPENSE, dec!(300));
        let (without, _) = derive_income(&ts).unwrap();
        assert_eq!(without.get(&p, fields::OPERATING_INCOME), Some(Figure::Value(dec!(300))));

        ts.insert(p, fields::DEPRECIATION, dec!(50));
        let (with, _) = derive_income(&ts).unwrap();
        assert_eq!(with.get(&p, fields::OPERATING_INCOME), Some(Figure::Value(dec!(250))));
    }

    #[test]
    fn test_zero_revenue_margin_undefined() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::REVENUE, dec!(0));
        ts.insert(Period::Index(1), fields::COGS, dec!(10));
        let (s, _) = derive_income(&ts).unwrap();
        assert_eq!(s.get(&Period::Index(1), fields::GROSS_PROFIT), Some(Figure::Value(dec!(-10))));
        assert_eq!(s.get(&Period::Index(1), fields::GROSS_MARGIN), Some(Figure::Undefined));
    }

    #[test]
    fn test_component_missing_in_one_period_is_undefined() {
        let mut ts = TimeSeries::new();
        for p in 1..=2 {
            ts.insert(Period::Index(p), fields::REVENUE, dec!(100));
            ts.insert(Period::Index(p), fields::COGS, dec!(30));
        }
        ts.insert(Period::Index(1), fields::OPERATING_EXPENSE, dec!(20));
        let (s, _) = derive_income(&ts).unwrap();
        assert_eq!(s.get(&Period::Index(1), fields::OPERATING_INCOME), Some(Figure::Value(dec!(50))));
        assert_eq!(s.get(&Period::Index(2), fields::OPERATING_INCOME), Some(Figure::Undefined));
        // Gross profit does not depend on opex
        assert_eq!(s.get(&Period::Index(2), fields::GROSS_PROFIT), Some(Figure::Value(dec!(70))));
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let (once, _) = derive_income(&monthly_income()).unwrap();
        let (twice, _) = derive_income(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_positional_periods_pass_through() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::REVENUE, dec!(1));
        ts.insert(Period::Index(2), fields::REVENUE, dec!(2));
        let out = build_profit_and_loss(&ProfitLossInput {
            data: ts,
            granularity: Some(Granularity::Annual),
        })
        .unwrap();
        assert_eq!(out.result.statement.len(), 2);
        assert!(out.warnings.iter().any(|w| w.contains("without aggregation")));
    }

    #[test]
    fn test_missing_revenue_rejected() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::COGS, dec!(1));
        assert!(matches!(derive_income(&ts), Err(EngineError::Validation { .. })));
    }
}
