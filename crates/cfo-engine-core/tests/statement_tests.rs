use cfo_engine_core::analysis::{compute_ratios, key_metrics, KeyMetricsInput, RatioInput};
use cfo_engine_core::fields;
use cfo_engine_core::ingest::{normalize_table, DatasetCache, RawTable, StatementKind};
use cfo_engine_core::statements::{
    analyze_balance_sheet, build_profit_and_loss, project_cash_flow, BalanceSheetInput, CashFlowInput,
    Granularity, ProfitLossInput,
};
use cfo_engine_core::{EngineConfig, EngineError, Figure, GrowthAssumptions, Period, TimeSeries};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::{json, Map, Value};

// ===========================================================================
// Quarterly dashboard sample
// ===========================================================================

const QUARTER_ENDS: [&str; 4] = ["2024-03-31", "2024-06-30", "2024-09-30", "2024-12-31"];

fn quarter(i: usize) -> Period {
    Period::Date(NaiveDate::parse_from_str(QUARTER_ENDS[i], "%Y-%m-%d").unwrap())
}

fn table(columns: &[&str], values: &[[i64; 4]]) -> RawTable {
    let mut header = vec!["Date".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    let rows = (0..4)
        .map(|q| {
            let mut row = vec![json!(QUARTER_ENDS[q])];
            row.extend(values.iter().map(|col| json!(col[q])));
            row
        })
        .collect();
    RawTable { columns: header, rows }
}

fn income_table() -> RawTable {
    table(
        &[
            "Revenue",
            "Cost of Goods Sold",
            "Gross Profit",
            "Operating Expenses",
            "Operating Income",
            "Interest Expense",
            "Income Before Tax",
            "Tax Expense",
            "Net Income",
        ],
        &[
            [100000, 120000, 150000, 180000],
            [60000, 70000, 85000, 100000],
            [40000, 50000, 65000, 80000],
            [30000, 35000, 40000, 45000],
            [10000, 15000, 25000, 35000],
            [2000, 2000, 2000, 2000],
            [8000, 13000, 23000, 33000],
            [2000, 3250, 5750, 8250],
            [6000, 9750, 17250, 24750],
        ],
    )
}

fn balance_table() -> RawTable {
    table(
        &[
            "Cash and Equivalents",
            "Accounts Receivable",
            "Inventory",
            "Current Assets",
            "Fixed Assets",
            "Total Assets",
            "Accounts Payable",
            "Short-term Debt",
            "Current Liabilities",
            "Long-term Debt",
            "Total Liabilities",
            "Equity",
        ],
        &[
            [50000, 55000, 70000, 90000],
            [30000, 35000, 40000, 45000],
            [40000, 45000, 50000, 55000],
            [120000, 135000, 160000, 190000],
            [200000, 195000, 190000, 185000],
            [320000, 330000, 350000, 375000],
            [25000, 30000, 35000, 40000],
            [20000, 20000, 20000, 20000],
            [45000, 50000, 55000, 60000],
            [100000, 95000, 90000, 85000],
            [145000, 145000, 145000, 145000],
            [175000, 185000, 205000, 230000],
        ],
    )
}

fn income() -> TimeSeries {
    normalize_table(&income_table(), StatementKind::ProfitAndLoss)
        .unwrap()
        .series
}

fn balance() -> TimeSeries {
    normalize_table(&balance_table(), StatementKind::BalanceSheet)
        .unwrap()
        .series
}

// ===========================================================================
// Normalization
// ===========================================================================

#[test]
fn test_income_normalization_matches_components_only() {
    let ds = normalize_table(&income_table(), StatementKind::ProfitAndLoss).unwrap();
    assert_eq!(ds.date_column.as_deref(), Some("Date"));
    assert_eq!(ds.series.periods(), (0..4).map(quarter).collect::<Vec<_>>());
    assert_eq!(
        ds.unmatched_columns,
        vec!["Gross Profit", "Operating Income", "Income Before Tax", "Net Income"]
    );
    assert_eq!(ds.series.figure(&quarter(3), fields::REVENUE), Figure::Value(dec!(180000)));
    assert_eq!(ds.series.figure(&quarter(3), fields::TAX_EXPENSE), Figure::Value(dec!(8250)));
}

#[test]
fn test_balance_normalization_drops_payables() {
    let ds = normalize_table(&balance_table(), StatementKind::BalanceSheet).unwrap();
    assert!(ds.unmatched_columns.contains(&"Accounts Payable".to_string()));
    assert!(ds.unmatched_columns.contains(&"Short-term Debt".to_string()));
    assert_eq!(ds.series.figure(&quarter(0), fields::CASH), Figure::Value(dec!(50000)));
    assert_eq!(
        ds.series.figure(&quarter(0), fields::LONG_TERM_LIABILITIES),
        Figure::Value(dec!(100000))
    );
}

#[test]
fn test_income_table_is_not_a_balance_sheet() {
    let err = normalize_table(&income_table(), StatementKind::BalanceSheet).unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
}

#[test]
fn test_records_and_accounting_formats() {
    let records: Vec<Map<String, Value>> = serde_json::from_value(json!([
        {"Month": "01/31/2024", "Sales Revenue": "$1,200.50", "COGS": "(200)"},
        {"Month": "02/29/2024", "Sales Revenue": "1 000", "COGS": "-"}
    ]))
    .unwrap();
    let table = RawTable::from_records(&records);
    let ds = normalize_table(&table, StatementKind::ProfitAndLoss).unwrap();
    let jan = Period::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    let feb = Period::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert_eq!(ds.series.figure(&jan, fields::REVENUE), Figure::Value(dec!(1200.50)));
    assert_eq!(ds.series.figure(&jan, fields::COGS), Figure::Value(dec!(-200)));
    assert_eq!(ds.series.figure(&feb, fields::REVENUE), Figure::Value(dec!(1000)));
    assert_eq!(ds.series.get(&feb, fields::COGS), None);
}

#[test]
fn test_cache_serves_same_dataset_until_data_changes() {
    let cache = DatasetCache::new();
    let first = cache
        .get_or_normalize("ledger", StatementKind::ProfitAndLoss, &income_table())
        .unwrap();
    let again = cache
        .get_or_normalize("ledger", StatementKind::ProfitAndLoss, &income_table())
        .unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &again));

    let mut changed = income_table();
    changed.rows[0][1] = json!(999);
    let refreshed = cache
        .get_or_normalize("ledger", StatementKind::ProfitAndLoss, &changed)
        .unwrap();
    assert_eq!(refreshed.series.figure(&quarter(0), fields::REVENUE), Figure::Value(dec!(999)));
    assert_eq!(cache.invalidate("ledger"), 1);
    assert!(cache.is_empty());
}

// ===========================================================================
// Statements
// ===========================================================================

#[test]
fn test_profit_and_loss_rebuilds_dashboard_lines() {
    let out = build_profit_and_loss(&ProfitLossInput {
        data: income(),
        granularity: None,
    })
    .unwrap();
    let s = &out.result.statement;
    let q4 = quarter(3);
    assert_eq!(s.figure(&q4, fields::GROSS_PROFIT), Figure::Value(dec!(80000)));
    assert_eq!(s.figure(&q4, fields::OPERATING_INCOME), Figure::Value(dec!(35000)));
    assert_eq!(s.figure(&q4, fields::PRETAX_INCOME), Figure::Value(dec!(33000)));
    assert_eq!(s.figure(&q4, fields::NET_INCOME), Figure::Value(dec!(24750)));
    assert_eq!(s.figure(&q4, fields::NET_MARGIN), Figure::Value(dec!(0.1375)));
    assert!(out.result.missing_lines.is_empty());
}

#[test]
fn test_annual_profit_and_loss_sums_quarters() {
    let out = build_profit_and_loss(&ProfitLossInput {
        data: income(),
        granularity: Some(Granularity::Annual),
    })
    .unwrap();
    let s = &out.result.statement;
    assert_eq!(s.len(), 1);
    let year = Period::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(s.figure(&year, fields::REVENUE), Figure::Value(dec!(550000)));
    assert_eq!(s.figure(&year, fields::NET_INCOME), Figure::Value(dec!(57750)));
}

#[test]
fn test_balance_sheet_comparative() {
    let out = analyze_balance_sheet(&BalanceSheetInput {
        data: balance(),
        comparative: true,
    })
    .unwrap();
    let s = &out.result.statement;
    assert_eq!(
        s.figure(&quarter(3), fields::WORKING_CAPITAL),
        Figure::Value(dec!(130000))
    );
    assert!(s.figure(&quarter(0), "total_assets_pct_change").is_undefined());
    assert_eq!(
        s.figure(&quarter(1), "cash_pct_change"),
        Figure::Value(dec!(0.1))
    );
    assert!(out.result.recomputed_totals.is_empty());
}

#[test]
fn test_cash_flow_projection_from_history() {
    let mut history = TimeSeries::new();
    for (i, (rev, opex)) in [(dec!(900), dec!(500)), (dec!(1100), dec!(500))].into_iter().enumerate() {
        let p = Period::Index(i as u32 + 1);
        history.insert(p, fields::REVENUE, rev);
        history.insert(p, fields::OPERATING_EXPENSE, opex);
        history.insert(p, fields::COGS, dec!(0));
        history.insert(p, fields::CAPITAL_EXPENDITURE, dec!(0));
    }
    let out = project_cash_flow(
        &CashFlowInput {
            data: history,
            periods: 3,
            growth: Some(GrowthAssumptions::uniform(dec!(0)).with_rate(fields::REVENUE, dec!(0.1))),
        },
        &EngineConfig::default(),
    )
    .unwrap();
    let s = &out.result.series;
    // mean revenue 1000, grown once
    assert_eq!(s.figure(&Period::Index(1), fields::REVENUE), Figure::Value(dec!(1100)));
    assert_eq!(s.figure(&Period::Index(3), fields::REVENUE), Figure::Value(dec!(1331)));
    assert_eq!(s.figure(&Period::Index(1), fields::NET_CASH_FLOW), Figure::Value(dec!(600)));
    assert_eq!(
        s.figure(&Period::Index(3), fields::CUMULATIVE_CASH_FLOW),
        Figure::Value(dec!(2141))
    );
}

// ===========================================================================
// Ratios and headline metrics
// ===========================================================================

#[test]
fn test_ratios_over_dashboard_sample() {
    let out = compute_ratios(&RatioInput {
        income: income(),
        balance: balance(),
        cash_flow: None,
        market_cap: None,
    })
    .unwrap();
    let report = &out.result;
    assert_eq!(report.periods.len(), 4);
    assert!(report.excluded.is_empty());

    let q4 = &report.periods[3];
    assert_eq!(q4.period, quarter(3));
    assert_eq!(
        q4.profitability.gross_margin.round_dp(4),
        Figure::Value(dec!(0.4444))
    );
    assert_eq!(q4.liquidity.current_ratio.round_dp(2), Figure::Value(dec!(3.17)));
    assert_eq!(q4.leverage.interest_coverage, Figure::Value(dec!(17.5)));
    assert!(q4.valuation.is_none());
}

#[test]
fn test_ebitda_uses_cash_flow_depreciation() {
    let mut cash_flow = TimeSeries::new();
    for q in 0..4 {
        cash_flow.insert(quarter(q), fields::DEPRECIATION, dec!(5000));
    }
    let out = compute_ratios(&RatioInput {
        income: income(),
        balance: balance(),
        cash_flow: Some(cash_flow),
        market_cap: Some(dec!(1000000)),
    })
    .unwrap();
    let q4 = &out.result.periods[3];
    // (35000 + 5000) / 180000
    assert_eq!(
        q4.profitability.ebitda_margin.round_dp(4),
        Figure::Value(dec!(0.2222))
    );
    let valuation = q4.valuation.as_ref().unwrap();
    // (1,000,000 + 85,000 - 90,000) / 40,000
    assert_eq!(valuation.ev_to_ebitda, Figure::Value(dec!(24.875)));
}

#[test]
fn test_misaligned_periods_are_reported() {
    let full = balance();
    let mut short_balance = TimeSeries::new();
    for (p, row) in full.rows().filter(|(p, _)| **p != quarter(0)) {
        for (field, value) in row {
            short_balance.insert(*p, field.clone(), *value);
        }
    }

    let out = compute_ratios(&RatioInput {
        income: income(),
        balance: short_balance,
        cash_flow: None,
        market_cap: None,
    })
    .unwrap();
    assert_eq!(out.result.periods.len(), 3);
    assert_eq!(out.result.excluded.income_only, vec![quarter(0)]);
}

#[test]
fn test_key_metrics_match_dashboard() {
    let out = key_metrics(&KeyMetricsInput {
        income: income(),
        balance: balance(),
    })
    .unwrap();
    let m = out.result;
    assert_eq!(m.revenue_growth, Figure::Value(dec!(0.2)));
    assert_eq!(m.current_ratio.round_dp(2), Figure::Value(dec!(3.17)));
    assert_eq!(m.debt_to_equity.round_dp(4), Figure::Value(dec!(0.6304)));
}
