use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, warn};

use super::dates::{is_date_like_column, parse_date_column};
use super::keywords::{keywords_for, match_column, required_groups, StatementKind};
use crate::error::EngineError;
use crate::series::{Period, TimeSeries};
use crate::types::{with_metadata, ComputationOutput};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Raw tabular records: one row per period or transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    /// Build a table from JSON objects. Columns keep first-seen order and a
    /// key missing from a record becomes a null cell.
    pub fn from_records(records: &[serde_json::Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        RawTable { columns, rows }
    }

    fn column_cells(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r[idx])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeInput {
    pub table: RawTable,
    pub statement: StatementKind,
    /// Identifies the data source for caching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// Which canonical fields a source column was summed into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub column: String,
    pub fields: Vec<String>,
}

/// A table cleaned into the internal time-series shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDataset {
    pub statement: StatementKind,
    pub series: TimeSeries,
    /// Column used for periods; `None` means periods are row positions.
    pub date_column: Option<String>,
    pub matches: Vec<ColumnMatch>,
    pub unmatched_columns: Vec<String>,
    /// Columns that matched more than one keyword group and were summed into each.
    pub ambiguous_columns: Vec<String>,
    /// Date-like columns whose cells did not all parse; left as-is.
    pub unparsed_date_columns: Vec<String>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Normalize a raw table and wrap it in the standard output envelope.
pub fn normalize(input: &NormalizeInput) -> EngineResult<ComputationOutput<NormalizedDataset>> {
    let start = Instant::now();
    let dataset = normalize_table(&input.table, input.statement)?;
    let warnings = dataset.warnings.clone();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Keyword-matched column normalization (ties summed)",
        &serde_json::json!({
            "statement": input.statement,
            "columns": input.table.columns.len(),
            "rows": input.table.rows.len(),
        }),
        warnings,
        elapsed,
        dataset,
    ))
}

/// Clean a raw table into a time series for the requested statement type.
///
/// Every column whose name contains a keyword of a field's group is summed
/// into that field. Rows sharing a period are summed as well.
pub fn normalize_table(table: &RawTable, statement: StatementKind) -> EngineResult<NormalizedDataset> {
    validate_shape(table)?;
    let mut warnings: Vec<String> = Vec::new();

    // -- Periods -------------------------------------------------------------
    let mut date_column: Option<(usize, Vec<chrono::NaiveDate>)> = None;
    let mut unparsed_date_columns = Vec::new();

    for (idx, name) in table.columns.iter().enumerate() {
        if !is_date_like_column(name) || date_column.is_some() {
            continue;
        }
        match parse_date_column(table.column_cells(idx)) {
            Some(dates) => date_column = Some((idx, dates)),
            None => {
                debug!(column = %name, "date-like column did not parse; left untouched");
                unparsed_date_columns.push(name.clone());
            }
        }
    }

    let periods: Vec<Period> = match &date_column {
        Some((_, dates)) => dates.iter().map(|d| Period::Date(*d)).collect(),
        None => (1..=table.rows.len() as u32).map(Period::Index).collect(),
    };
    let date_idx = date_column.as_ref().map(|(i, _)| *i);

    // -- Column matching ---------------------------------------------------
    let mut matches = Vec::new();
    let mut unmatched_columns = Vec::new();
    let mut ambiguous_columns = Vec::new();

    for (idx, name) in table.columns.iter().enumerate() {
        if Some(idx) == date_idx {
            continue;
        }
        let fields = match_column(statement, name);
        if fields.is_empty() {
            unmatched_columns.push(name.clone());
            continue;
        }
        if fields.len() > 1 {
            warn!(column = %name, ?fields, "column matches several keyword groups");
            warnings.push(format!(
                "Ambiguous column '{name}' matches {}; summed into each",
                fields.join(", ")
            ));
            ambiguous_columns.push(name.clone());
        }
        matches.push((idx, fields));
    }

    // -- Required groups -----------------------------------------------------
    for group in required_groups(statement) {
        let satisfied = matches
            .iter()
            .any(|(_, fields)| fields.iter().any(|f| group.contains(f)));
        if !satisfied {
            let keywords: Vec<&str> = group
                .iter()
                .flat_map(|f| keywords_for(statement, f).iter().copied())
                .collect();
            return Err(EngineError::validation(
                group.join("|"),
                format!(
                    "No column matches the required keyword group for {statement} (keywords: {})",
                    keywords.join(", ")
                ),
            ));
        }
    }

    // -- Accumulate --------------------------------------------------------
    let mut series = TimeSeries::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        let period = periods[row_idx];
        series.ensure_period(period);
        for (col_idx, fields) in &matches {
            let amount = parse_amount(&row[*col_idx]).ok_or_else(|| {
                EngineError::validation(
                    table.columns[*col_idx].clone(),
                    format!("Row {}: '{}' is not a number", row_idx + 1, row[*col_idx]),
                )
            })?;
            if let Some(amount) = amount {
                for field in fields {
                    series.accumulate(period, field, amount);
                }
            }
        }
    }

    if date_idx.is_some() && series.len() < table.rows.len() {
        warnings.push(format!(
            "{} rows collapsed into {} periods (values summed per period)",
            table.rows.len(),
            series.len()
        ));
    }
    if !unparsed_date_columns.is_empty() {
        warnings.push(format!(
            "Date-like column(s) left unparsed: {}",
            unparsed_date_columns.join(", ")
        ));
    }

    debug!(
        %statement,
        periods = series.len(),
        matched = matches.len(),
        unmatched = unmatched_columns.len(),
        "normalized table"
    );

    Ok(NormalizedDataset {
        statement,
        series,
        date_column: date_idx.map(|i| table.columns[i].clone()),
        matches: matches
            .into_iter()
            .map(|(idx, fields)| ColumnMatch {
                column: table.columns[idx].clone(),
                fields: fields.into_iter().map(String::from).collect(),
            })
            .collect(),
        unmatched_columns,
        ambiguous_columns,
        unparsed_date_columns,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_shape(table: &RawTable) -> EngineResult<()> {
    if table.columns.is_empty() {
        return Err(EngineError::validation("columns", "Table has no columns"));
    }
    if table.rows.is_empty() {
        return Err(EngineError::InsufficientData("Table has no rows".into()));
    }
    for (i, row) in table.rows.iter().enumerate() {
        if row.len() != table.columns.len() {
            return Err(EngineError::validation(
                "rows",
                format!(
                    "Row {} has {} cells, expected {}",
                    i + 1,
                    row.len(),
                    table.columns.len()
                ),
            ));
        }
    }
    Ok(())
}

/// Parse a numeric cell. `Some(None)` is an empty cell, `None` is garbage.
///
/// Accepts JSON numbers and strings with currency symbols, thousands
/// separators and accounting parentheses for negatives.
pub(crate) fn parse_amount(value: &Value) -> Option<Option<Decimal>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => parse_decimal(&n.to_string()).map(Some),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed == "-"
                || trimmed.eq_ignore_ascii_case("n/a")
                || trimmed.eq_ignore_ascii_case("nan")
            {
                return Some(None);
            }
            let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
            let cleaned: String = trimmed
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' ' | '(' | ')'))
                .collect();
            let parsed = parse_decimal(&cleaned)?;
            Some(Some(if negative { -parsed } else { parsed }))
        }
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::types::Figure;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> RawTable {
        RawTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    fn q(y: i32, m: u32) -> Period {
        Period::Date(NaiveDate::from_ymd_opt(y, m, 1).unwrap())
    }

    #[test]
    fn test_matching_columns_are_summed() {
        let t = table(
            &["Month", "Product Revenue", "Service Revenue", "COGS"],
            vec![
                vec![json!("2024-01"), json!(100), json!(50), json!(60)],
                vec![json!("2024-02"), json!(120), json!(40), json!(70)],
            ],
        );
        let ds = normalize_table(&t, StatementKind::ProfitAndLoss).unwrap();
        assert_eq!(ds.series.get(&q(2024, 1), fields::REVENUE), Some(Figure::Value(dec!(150))));
        assert_eq!(ds.series.get(&q(2024, 2), fields::REVENUE), Some(Figure::Value(dec!(160))));
        assert_eq!(ds.date_column.as_deref(), Some("Month"));
    }

    #[test]
    fn test_missing_required_group_fails() {
        let t = table(&["Date", "COGS"], vec![vec![json!("2024-01-01"), json!(10)]]);
        let err = normalize_table(&t, StatementKind::ProfitAndLoss).unwrap_err();
        match err {
            EngineError::Validation { field, reason } => {
                assert_eq!(field, "revenue");
                assert!(reason.contains("revenue"));
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_rows_sorted_and_same_period_summed() {
        let t = table(
            &["Date", "Revenue"],
            vec![
                vec![json!("2024-03-01"), json!("1,000")],
                vec![json!("2024-01-01"), json!(200)],
                vec![json!("2024-03-01"), json!("$500")],
            ],
        );
        let ds = normalize_table(&t, StatementKind::CashFlow).unwrap();
        assert_eq!(ds.series.periods(), vec![q(2024, 1), q(2024, 3)]);
        assert_eq!(ds.series.get(&q(2024, 3), fields::REVENUE), Some(Figure::Value(dec!(1500))));
        assert_eq!(ds.warnings.len(), 1);
    }

    #[test]
    fn test_unparseable_date_column_left_untouched() {
        let t = table(
            &["Period", "Revenue"],
            vec![
                vec![json!("FY-start"), json!(10)],
                vec![json!("FY-end"), json!(20)],
            ],
        );
        let ds = normalize_table(&t, StatementKind::ProfitAndLoss).unwrap();
        assert_eq!(ds.date_column, None);
        assert_eq!(ds.unparsed_date_columns, vec!["Period".to_string()]);
        assert_eq!(ds.series.periods(), vec![Period::Index(1), Period::Index(2)]);
    }

    #[test]
    fn test_null_cells_are_absent() {
        let t = table(
            &["Revenue", "Operating Expenses"],
            vec![vec![json!(100), Value::Null], vec![json!(110), json!(30)]],
        );
        let ds = normalize_table(&t, StatementKind::ProfitAndLoss).unwrap();
        assert_eq!(ds.series.get(&Period::Index(1), fields::OPERATING_EXPENSE), None);
        assert_eq!(
            ds.series.get(&Period::Index(2), fields::OPERATING_EXPENSE),
            Some(Figure::Value(dec!(30)))
        );
    }

    #[test]
    fn test_non_numeric_cell_is_validation_error() {
        let t = table(&["Revenue"], vec![vec![json!("lots")]]);
        assert!(matches!(
            normalize_table(&t, StatementKind::ProfitAndLoss),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_ambiguous_column_is_reported() {
        let t = table(
            &["Total Assets", "Total Liabilities and Equity", "Total Liabilities"],
            vec![vec![json!(500), json!(500), json!(200)]],
        );
        let ds = normalize_table(&t, StatementKind::BalanceSheet).unwrap();
        assert_eq!(ds.ambiguous_columns, vec!["Total Liabilities and Equity".to_string()]);
        // Ties are summed: 500 + 200
        assert_eq!(
            ds.series.get(&Period::Index(1), crate::fields::TOTAL_LIABILITIES),
            Some(Figure::Value(dec!(700)))
        );
        assert!(ds.warnings.iter().any(|w| w.contains("Ambiguous")));
    }

    #[test]
    fn test_accounting_negative() {
        assert_eq!(parse_amount(&json!("(1,250.50)")), Some(Some(dec!(-1250.50))));
        assert_eq!(parse_amount(&json!("")), Some(None));
        assert_eq!(parse_amount(&json!(true)), None);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let t = table(&["Revenue", "COGS"], vec![vec![json!(1)]]);
        assert!(normalize_table(&t, StatementKind::ProfitAndLoss).is_err());
    }

    #[test]
    fn test_from_records_fills_missing_keys() {
        let records: Vec<serde_json::Map<String, Value>> = vec![
            serde_json::from_value(json!({"Revenue": 1})).unwrap(),
            serde_json::from_value(json!({"Revenue": 2, "COGS": 1})).unwrap(),
        ];
        let t = RawTable::from_records(&records);
        assert_eq!(t.columns, vec!["Revenue".to_string(), "COGS".to_string()]);
        assert_eq!(t.rows[0][1], Value::Null);
    }
}
