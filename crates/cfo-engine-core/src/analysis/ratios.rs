use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::fields;
use crate::series::{Period, Row, TimeSeries, UndefinedCell};
use crate::statements::balance_sheet::derive_balance;
use crate::statements::profit_loss::derive_income;
use crate::types::{with_metadata, ComputationOutput, Figure, Money};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioInput {
    pub income: TimeSeries,
    pub balance: TimeSeries,
    /// Source of depreciation for EBITDA when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<TimeSeries>,
    /// Applies to every period; otherwise a `market_cap` balance field is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profitability {
    pub gross_margin: Figure,
    pub operating_margin: Figure,
    pub net_margin: Figure,
    pub ebitda_margin: Figure,
    pub return_on_assets: Figure,
    pub return_on_equity: Figure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidity {
    pub current_ratio: Figure,
    pub quick_ratio: Figure,
    pub cash_ratio: Figure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Efficiency {
    pub asset_turnover: Figure,
    pub inventory_turnover: Figure,
    pub receivables_turnover: Figure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leverage {
    pub debt_to_equity: Figure,
    pub debt_to_assets: Figure,
    pub equity_multiplier: Figure,
    pub interest_coverage: Figure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub market_cap: Figure,
    pub price_to_earnings: Figure,
    pub price_to_book: Figure,
    pub ev_to_ebitda: Figure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRatios {
    pub period: Period,
    pub profitability: Profitability,
    pub liquidity: Liquidity,
    pub efficiency: Efficiency,
    pub leverage: Leverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<Valuation>,
}

/// Periods that appear in only one of the two statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludedPeriods {
    pub income_only: Vec<Period>,
    pub balance_only: Vec<Period>,
}

impl ExcludedPeriods {
    pub fn is_empty(&self) -> bool {
        self.income_only.is_empty() && self.balance_only.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioReport {
    pub periods: Vec<PeriodRatios>,
    pub excluded: ExcludedPeriods,
    pub undefined: Vec<UndefinedCell>,
}

impl PeriodRatios {
    /// Every ratio with its stable name, in reporting order.
    pub fn named(&self) -> Vec<(&'static str, Figure)> {
        let p = &self.profitability;
        let l = &self.liquidity;
        let e = &self.efficiency;
        let v = &self.leverage;
        let mut out = vec![
            ("gross_margin", p.gross_margin),
            ("operating_margin", p.operating_margin),
            ("net_margin", p.net_margin),
            ("ebitda_margin", p.ebitda_margin),
            ("return_on_assets", p.return_on_assets),
            ("return_on_equity", p.return_on_equity),
            ("current_ratio", l.current_ratio),
            ("quick_ratio", l.quick_ratio),
            ("cash_ratio", l.cash_ratio),
            ("asset_turnover", e.asset_turnover),
            ("inventory_turnover", e.inventory_turnover),
            ("receivables_turnover", e.receivables_turnover),
            ("debt_to_equity", v.debt_to_equity),
            ("debt_to_assets", v.debt_to_assets),
            ("equity_multiplier", v.equity_multiplier),
            ("interest_coverage", v.interest_coverage),
        ];
        if let Some(val) = &self.valuation {
            out.extend([
                ("price_to_earnings", val.price_to_earnings),
                ("price_to_book", val.price_to_book),
                ("ev_to_ebitda", val.ev_to_ebitda),
            ]);
        }
        out
    }
}

impl RatioReport {
    /// Flat ratio series for tabular or chart output.
    pub fn to_series(&self) -> TimeSeries {
        let mut ts = TimeSeries::new();
        for pr in &self.periods {
            for (name, value) in pr.named() {
                ts.insert(pr.period, name, value);
            }
        }
        ts
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn compute_ratios(input: &RatioInput) -> EngineResult<ComputationOutput<RatioReport>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let (income, missing_lines) = derive_income(&input.income)?;
    for field in &missing_lines {
        warnings.push(format!("Income '{field}' not present; dependent ratios are undefined"));
    }
    let (balance, recomputed) = derive_balance(&input.balance)?;
    for total in &recomputed {
        warnings.push(format!("Balance '{total}' recomputed from components"));
    }

    // --- Period alignment ---
    let excluded = ExcludedPeriods {
        income_only: income
            .periods()
            .into_iter()
            .filter(|p| !balance.contains_period(p))
            .collect(),
        balance_only: balance
            .periods()
            .into_iter()
            .filter(|p| !income.contains_period(p))
            .collect(),
    };
    if !excluded.is_empty() {
        warnings.push(format!(
            "{} income and {} balance periods have no counterpart and were excluded",
            excluded.income_only.len(),
            excluded.balance_only.len()
        ));
    }

    let has_market_cap = input.market_cap.is_some() || balance.has_field(fields::MARKET_CAP);
    if !has_market_cap {
        warnings.push("No market capitalization; valuation ratios omitted".to_string());
    }

    let mut periods = Vec::new();
    for (period, inc) in income.rows() {
        let Some(bal) = balance.row(period) else {
            continue;
        };
        let depreciation = depreciation_for(period, inc, input.cash_flow.as_ref());
        let market_cap = match input.market_cap {
            Some(mc) => Some(Figure::Value(mc)),
            None if has_market_cap => Some(pick(bal, fields::MARKET_CAP)),
            None => None,
        };
        periods.push(period_ratios(*period, inc, bal, depreciation, market_cap));
    }

    let undefined = periods
        .iter()
        .flat_map(|pr| {
            pr.named()
                .into_iter()
                .filter(|(_, v)| v.is_undefined())
                .map(move |(name, _)| UndefinedCell {
                    period: pr.period,
                    field: name.to_string(),
                })
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Financial ratio analysis over aligned income and balance periods",
        &serde_json::json!({
            "income_periods": input.income.len(),
            "balance_periods": input.balance.len(),
            "has_cash_flow": input.cash_flow.is_some(),
            "market_cap": input.market_cap,
        }),
        warnings,
        elapsed,
        RatioReport {
            periods,
            excluded,
            undefined,
        },
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pick(row: &Row, field: &str) -> Figure {
    row.get(field).copied().unwrap_or(Figure::Undefined)
}

/// Depreciation to add back to operating income. An income statement line
/// was subtracted there and is added back as is; otherwise operating expense
/// carried it and the cash flow statement supplies the amount.
fn depreciation_for(period: &Period, income: &Row, cash_flow: Option<&TimeSeries>) -> Figure {
    income
        .get(fields::DEPRECIATION)
        .copied()
        .or_else(|| cash_flow.and_then(|cf| cf.get(period, fields::DEPRECIATION)))
        .unwrap_or(Figure::Undefined)
}

fn period_ratios(
    period: Period,
    inc: &Row,
    bal: &Row,
    depreciation: Figure,
    market_cap: Option<Figure>,
) -> PeriodRatios {
    let revenue = pick(inc, fields::REVENUE);
    let cogs = pick(inc, fields::COGS);
    let operating_income = pick(inc, fields::OPERATING_INCOME);
    let net_income = pick(inc, fields::NET_INCOME);
    let interest = pick(inc, fields::INTEREST_EXPENSE);
    let ebitda = operating_income + depreciation;

    let total_assets = pick(bal, fields::TOTAL_ASSETS);
    let total_liabilities = pick(bal, fields::TOTAL_LIABILITIES);
    let equity = pick(bal, fields::TOTAL_EQUITY);
    let current_assets = pick(bal, fields::CURRENT_ASSETS);
    let current_liabilities = pick(bal, fields::CURRENT_LIABILITIES);
    let cash = pick(bal, fields::CASH);
    let inventory = pick(bal, fields::INVENTORY);
    let receivables = pick(bal, fields::RECEIVABLES);

    let valuation = market_cap.map(|mc| {
        // Long-term debt when reported, else all liabilities.
        let debt = bal
            .get(fields::LONG_TERM_LIABILITIES)
            .copied()
            .unwrap_or(total_liabilities);
        Valuation {
            market_cap: mc,
            price_to_earnings: Figure::ratio(mc, net_income),
            price_to_book: Figure::ratio(mc, equity),
            ev_to_ebitda: Figure::ratio(mc + debt - cash, ebitda),
        }
    });

    PeriodRatios {
        period,
        profitability: Profitability {
            gross_margin: Figure::ratio(pick(inc, fields::GROSS_PROFIT), revenue),
            operating_margin: Figure::ratio(operating_income, revenue),
            net_margin: Figure::ratio(net_income, revenue),
            ebitda_margin: Figure::ratio(ebitda, revenue),
            return_on_assets: Figure::ratio(net_income, total_assets),
            return_on_equity: Figure::ratio(net_income, equity),
        },
        liquidity: Liquidity {
            current_ratio: Figure::ratio(current_assets, current_liabilities),
            quick_ratio: Figure::ratio(current_assets - inventory, current_liabilities),
            cash_ratio: Figure::ratio(cash, current_liabilities),
        },
        efficiency: Efficiency {
            asset_turnover: Figure::ratio(revenue, total_assets),
            inventory_turnover: Figure::ratio(cogs, inventory),
            receivables_turnover: Figure::ratio(revenue, receivables),
        },
        leverage: Leverage {
            debt_to_equity: Figure::ratio(total_liabilities, equity),
            debt_to_assets: Figure::ratio(total_liabilities, total_assets),
            equity_multiplier: Figure::ratio(total_assets, equity),
            interest_coverage: Figure::ratio(operating_income, interest),
        },
        valuation,
    }
}
