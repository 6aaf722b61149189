use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fields;

/// Which statement a raw table is being normalized for. Determines the
/// keyword groups that are matched and which of them are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    #[serde(alias = "cashflow")]
    CashFlow,
    #[serde(alias = "pnl", alias = "income", alias = "income_statement")]
    ProfitAndLoss,
    #[serde(alias = "balance")]
    BalanceSheet,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementKind::CashFlow => "cash_flow",
            StatementKind::ProfitAndLoss => "profit_and_loss",
            StatementKind::BalanceSheet => "balance_sheet",
        };
        write!(f, "{s}")
    }
}

/// Columns whose lowercase name contains any keyword are summed into `field`.
#[derive(Debug, Clone, Copy)]
pub struct KeywordGroup {
    pub field: &'static str,
    pub keywords: &'static [&'static str],
}

const REVENUE: KeywordGroup = KeywordGroup {
    field: fields::REVENUE,
    keywords: &["revenue", "turnover"],
};
const COGS: KeywordGroup = KeywordGroup {
    field: fields::COGS,
    keywords: &["cost of goods", "cogs", "cost of sales"],
};
const OPERATING_EXPENSE: KeywordGroup = KeywordGroup {
    field: fields::OPERATING_EXPENSE,
    keywords: &["operating expense", "opex", "sg&a"],
};
const CAPITAL_EXPENDITURE: KeywordGroup = KeywordGroup {
    field: fields::CAPITAL_EXPENDITURE,
    keywords: &["capital expenditure", "capex"],
};
const INTEREST_EXPENSE: KeywordGroup = KeywordGroup {
    field: fields::INTEREST_EXPENSE,
    keywords: &["interest"],
};
const TAX_EXPENSE: KeywordGroup = KeywordGroup {
    field: fields::TAX_EXPENSE,
    keywords: &["tax expense", "income tax", "taxes"],
};
const DEPRECIATION: KeywordGroup = KeywordGroup {
    field: fields::DEPRECIATION,
    keywords: &["depreciation", "amortization", "amortisation"],
};

const TOTAL_ASSETS: KeywordGroup = KeywordGroup {
    field: fields::TOTAL_ASSETS,
    keywords: &["total assets"],
};
const CURRENT_ASSETS: KeywordGroup = KeywordGroup {
    field: fields::CURRENT_ASSETS,
    keywords: &["current assets"],
};
const FIXED_ASSETS: KeywordGroup = KeywordGroup {
    field: fields::FIXED_ASSETS,
    keywords: &["fixed assets", "property, plant", "pp&e"],
};
const CASH: KeywordGroup = KeywordGroup {
    field: fields::CASH,
    keywords: &["cash"],
};
const RECEIVABLES: KeywordGroup = KeywordGroup {
    field: fields::RECEIVABLES,
    keywords: &["receivable"],
};
const INVENTORY: KeywordGroup = KeywordGroup {
    field: fields::INVENTORY,
    keywords: &["inventory", "inventories"],
};
const TOTAL_LIABILITIES: KeywordGroup = KeywordGroup {
    field: fields::TOTAL_LIABILITIES,
    keywords: &["total liabilities"],
};
const CURRENT_LIABILITIES: KeywordGroup = KeywordGroup {
    field: fields::CURRENT_LIABILITIES,
    keywords: &["current liabilities"],
};
const LONG_TERM_LIABILITIES: KeywordGroup = KeywordGroup {
    field: fields::LONG_TERM_LIABILITIES,
    keywords: &[
        "long-term debt",
        "long term debt",
        "long-term liabilities",
        "long term liabilities",
    ],
};
const EQUITY: KeywordGroup = KeywordGroup {
    field: fields::TOTAL_EQUITY,
    keywords: &["equity"],
};
const MARKET_CAP: KeywordGroup = KeywordGroup {
    field: fields::MARKET_CAP,
    keywords: &["market cap"],
};

const PNL_GROUPS: &[KeywordGroup] = &[
    REVENUE,
    COGS,
    OPERATING_EXPENSE,
    INTEREST_EXPENSE,
    TAX_EXPENSE,
    DEPRECIATION,
];

const CASH_FLOW_GROUPS: &[KeywordGroup] = &[
    REVENUE,
    COGS,
    OPERATING_EXPENSE,
    CAPITAL_EXPENDITURE,
    DEPRECIATION,
];

const BALANCE_GROUPS: &[KeywordGroup] = &[
    TOTAL_ASSETS,
    CURRENT_ASSETS,
    FIXED_ASSETS,
    CASH,
    RECEIVABLES,
    INVENTORY,
    TOTAL_LIABILITIES,
    CURRENT_LIABILITIES,
    LONG_TERM_LIABILITIES,
    EQUITY,
    MARKET_CAP,
];

/// Each inner slice is satisfied when at least one of its fields matched.
const PNL_REQUIRED: &[&[&str]] = &[&[fields::REVENUE]];
const CASH_FLOW_REQUIRED: &[&[&str]] = &[&[fields::REVENUE]];
const BALANCE_REQUIRED: &[&[&str]] = &[
    &[fields::TOTAL_ASSETS, fields::CURRENT_ASSETS, fields::FIXED_ASSETS],
    &[
        fields::TOTAL_LIABILITIES,
        fields::CURRENT_LIABILITIES,
        fields::LONG_TERM_LIABILITIES,
    ],
    &[fields::TOTAL_EQUITY],
];

pub fn keyword_groups(kind: StatementKind) -> &'static [KeywordGroup] {
    match kind {
        StatementKind::CashFlow => CASH_FLOW_GROUPS,
        StatementKind::ProfitAndLoss => PNL_GROUPS,
        StatementKind::BalanceSheet => BALANCE_GROUPS,
    }
}

pub fn required_groups(kind: StatementKind) -> &'static [&'static [&'static str]] {
    match kind {
        StatementKind::CashFlow => CASH_FLOW_REQUIRED,
        StatementKind::ProfitAndLoss => PNL_REQUIRED,
        StatementKind::BalanceSheet => BALANCE_REQUIRED,
    }
}

/// Keywords that feed `field` for this statement kind.
pub fn keywords_for(kind: StatementKind, field: &str) -> &'static [&'static str] {
    keyword_groups(kind)
        .iter()
        .find(|g| g.field == field)
        .map(|g| g.keywords)
        .unwrap_or(&[])
}

/// All fields whose keyword group matches `column` (case-insensitive
/// substring). More than one result means the column is ambiguous.
pub fn match_column(kind: StatementKind, column: &str) -> Vec<&'static str> {
    let lowered = column.to_lowercase();
    keyword_groups(kind)
        .iter()
        .filter(|g| g.keywords.iter().any(|k| lowered.contains(k)))
        .map(|g| g.field)
        .collect()
}
