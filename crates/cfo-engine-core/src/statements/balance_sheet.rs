use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EngineError;
use crate::fields;
use crate::series::{Row, TimeSeries};
use crate::types::{with_metadata, ComputationOutput, Figure};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSheetInput {
    /// Normalized balance-sheet data
    pub data: TimeSeries,
    /// Append `<column>_pct_change` for every column
    #[serde(default)]
    pub comparative: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSheetAnalysis {
    pub statement: TimeSeries,
    /// Totals that had no column of their own and were summed from parts
    pub recomputed_totals: Vec<String>,
    pub comparative: bool,
}

/// A total and the parts it is rebuilt from when the data has no total column.
struct TotalRule {
    total: &'static str,
    parts: [&'static str; 2],
}

const TOTAL_RULES: [TotalRule; 2] = [
    TotalRule {
        total: fields::TOTAL_ASSETS,
        parts: [fields::CURRENT_ASSETS, fields::FIXED_ASSETS],
    },
    TotalRule {
        total: fields::TOTAL_LIABILITIES,
        parts: [fields::CURRENT_LIABILITIES, fields::LONG_TERM_LIABILITIES],
    },
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn analyze_balance_sheet(
    input: &BalanceSheetInput,
) -> EngineResult<ComputationOutput<BalanceSheetAnalysis>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let (mut statement, recomputed_totals) = derive_balance(&input.data)?;
    for total in &recomputed_totals {
        warnings.push(format!("No '{total}' column; recomputed from its components"));
    }

    if input.comparative {
        statement = with_pct_change(&statement);
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Balance sheet totals with liquidity and leverage ratios",
        &serde_json::json!({
            "periods": input.data.len(),
            "comparative": input.comparative,
        }),
        warnings,
        elapsed,
        BalanceSheetAnalysis {
            statement,
            recomputed_totals,
            comparative: input.comparative,
        },
    ))
}

/// Fill in totals and recompute current ratio, debt-to-equity,
/// debt-to-asset and working capital for every period.
pub fn derive_balance(series: &TimeSeries) -> EngineResult<(TimeSeries, Vec<String>)> {
    if !series.has_field(fields::TOTAL_EQUITY) {
        return Err(EngineError::validation(
            fields::TOTAL_EQUITY,
            "Balance sheet data has no equity line",
        ));
    }

    let recomputed: Vec<String> = TOTAL_RULES
        .iter()
        .filter(|rule| !series.has_field(rule.total))
        .map(|rule| rule.total.to_string())
        .collect();

    for rule in TOTAL_RULES.iter().filter(|r| recomputed.iter().any(|t| t == r.total)) {
        if !rule.parts.iter().any(|p| series.has_field(p)) {
            return Err(EngineError::validation(
                rule.total,
                format!(
                    "Neither '{}' nor its components ({}) are present",
                    rule.total,
                    rule.parts.join(", ")
                ),
            ));
        }
    }

    let mut out = TimeSeries::new();
    for (period, row) in series.rows() {
        let mut values: Row = row.clone();

        for rule in TOTAL_RULES.iter().filter(|r| recomputed.iter().any(|t| t == r.total)) {
            let total: Figure = rule
                .parts
                .iter()
                .filter(|p| series.has_field(p))
                .map(|p| row.get(*p).copied().unwrap_or(Figure::Undefined))
                .sum();
            values.insert(rule.total.to_string(), total);
        }

        let get = |field: &str| values.get(field).copied().unwrap_or(Figure::Undefined);
        let total_assets = get(fields::TOTAL_ASSETS);
        let total_liabilities = get(fields::TOTAL_LIABILITIES);
        let current_assets = get(fields::CURRENT_ASSETS);
        let current_liabilities = get(fields::CURRENT_LIABILITIES);
        let equity = get(fields::TOTAL_EQUITY);

        let derived = [
            (fields::CURRENT_RATIO, Figure::ratio(current_assets, current_liabilities)),
            (fields::DEBT_TO_EQUITY, Figure::ratio(total_liabilities, equity)),
            (fields::DEBT_TO_ASSET, Figure::ratio(total_liabilities, total_assets)),
            (fields::WORKING_CAPITAL, current_assets - current_liabilities),
        ];
        for (field, value) in derived {
            values.insert(field.to_string(), value);
        }

        for (field, value) in values {
            out.insert(*period, field, value);
        }
    }
    Ok((out, recomputed))
}

/// Copy of `series` with a `<column>_pct_change` column for every column.
/// The first period, and any period whose prior value is zero or missing,
/// gets `Undefined`.
pub fn with_pct_change(series: &TimeSeries) -> TimeSeries {
    let columns: Vec<String> = series
        .fields()
        .into_iter()
        .filter(|f| !f.ends_with(fields::PCT_CHANGE_SUFFIX))
        .collect();

    let mut out = series.clone();
    let mut prior: Option<&Row> = None;
    for (period, row) in series.rows() {
        for column in &columns {
            let change = match (prior, row.get(column)) {
                (Some(prev), Some(current)) => {
                    Figure::pct_change(*current, prev.get(column).copied().unwrap_or(Figure::Undefined))
                }
                _ => Figure::Undefined,
            };
            out.insert(*period, format!("{column}{}", fields::PCT_CHANGE_SUFFIX), change);
        }
        prior = Some(row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Period;
    use rust_decimal_macros::dec;

    fn balance() -> TimeSeries {
        let mut ts = TimeSeries::new();
        let rows = [
            (dec!(250000), dec!(80000), dec!(100000), dec!(150000)),
            (dec!(300000), dec!(90000), dec!(110000), dec!(190000)),
        ];
        for (i, (ca, cl, ltd, eq)) in rows.into_iter().enumerate() {
            let p = Period::Index(i as u32 + 1);
            ts.insert(p, fields::CURRENT_ASSETS, ca);
            ts.insert(p, fields::FIXED_ASSETS, dec!(100000));
            ts.insert(p, fields::CURRENT_LIABILITIES, cl);
            ts.insert(p, fields::LONG_TERM_LIABILITIES, ltd);
            ts.insert(p, fields::TOTAL_EQUITY, eq);
        }
        ts
    }

    #[test]
    fn test_totals_recomputed_from_parts() {
        let (s, recomputed) = derive_balance(&balance()).unwrap();
        assert_eq!(recomputed.len(), 2);
        let p1 = Period::Index(1);
        assert_eq!(s.get(&p1, fields::TOTAL_ASSETS), Some(Figure::Value(dec!(350000))));
        assert_eq!(s.get(&p1, fields::TOTAL_LIABILITIES), Some(Figure::Value(dec!(180000))));
        assert_eq!(s.get(&p1, fields::CURRENT_RATIO), Some(Figure::Value(dec!(3.125))));
        assert_eq!(s.get(&p1, fields::DEBT_TO_EQUITY), Some(Figure::Value(dec!(1.2))));
        assert_eq!(s.get(&p1, fields::WORKING_CAPITAL), Some(Figure::Value(dec!(170000))));
    }

    #[test]
    fn test_reported_total_wins() {
        let mut ts = balance();
        ts.insert(Period::Index(1), fields::TOTAL_ASSETS, dec!(400000));
        let (s, recomputed) = derive_balance(&ts).unwrap();
        assert_eq!(recomputed, vec![fields::TOTAL_LIABILITIES.to_string()]);
        assert_eq!(s.get(&Period::Index(1), fields::TOTAL_ASSETS), Some(Figure::Value(dec!(400000))));
        // Column exists but period 2 has no value
        assert_eq!(s.get(&Period::Index(2), fields::TOTAL_ASSETS), None);
        assert_eq!(s.get(&Period::Index(2), fields::DEBT_TO_ASSET), Some(Figure::Undefined));
    }

    #[test]
    fn test_zero_equity_is_undefined() {
        let mut ts = balance();
        ts.insert(Period::Index(2), fields::TOTAL_EQUITY, dec!(0));
        let (s, _) = derive_balance(&ts).unwrap();
        assert_eq!(s.get(&Period::Index(2), fields::DEBT_TO_EQUITY), Some(Figure::Undefined));
    }

    #[test]
    fn test_comparative_columns() {
        let out = analyze_balance_sheet(&BalanceSheetInput {
            data: balance(),
            comparative: true,
        })
        .unwrap();
        let s = &out.result.statement;
        let key = format!("{}{}", fields::CURRENT_ASSETS, fields::PCT_CHANGE_SUFFIX);
        assert_eq!(s.get(&Period::Index(1), &key), Some(Figure::Undefined));
        assert_eq!(s.get(&Period::Index(2), &key), Some(Figure::Value(dec!(0.2))));
        let ratio_key = format!("{}{}", fields::CURRENT_RATIO, fields::PCT_CHANGE_SUFFIX);
        assert!(s.get(&Period::Index(2), &ratio_key).is_some());
    }

    #[test]
    fn test_missing_equity_rejected() {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::TOTAL_ASSETS, dec!(1));
        assert!(derive_balance(&ts).is_err());
    }
}
