//! Canonical field names shared by the normalizer, statements and ratios.

// Income / cash flow components
pub const REVENUE: &str = "revenue";
pub const COGS: &str = "cogs";
pub const OPERATING_EXPENSE: &str = "operating_expense";
pub const CAPITAL_EXPENDITURE: &str = "capital_expenditure";
pub const INTEREST_EXPENSE: &str = "interest_expense";
pub const TAX_EXPENSE: &str = "tax_expense";
pub const DEPRECIATION: &str = "depreciation";

// Income derived
pub const GROSS_PROFIT: &str = "gross_profit";
pub const OPERATING_INCOME: &str = "operating_income";
pub const PRETAX_INCOME: &str = "pretax_income";
pub const NET_INCOME: &str = "net_income";
pub const GROSS_MARGIN: &str = "gross_margin";
pub const OPERATING_MARGIN: &str = "operating_margin";
pub const NET_MARGIN: &str = "net_margin";

// Cash flow derived
pub const NET_CASH_FLOW: &str = "net_cash_flow";
pub const CUMULATIVE_CASH_FLOW: &str = "cumulative_cash_flow";

// Balance sheet components
pub const TOTAL_ASSETS: &str = "total_assets";
pub const CURRENT_ASSETS: &str = "current_assets";
pub const FIXED_ASSETS: &str = "fixed_assets";
pub const CASH: &str = "cash";
pub const RECEIVABLES: &str = "receivables";
pub const INVENTORY: &str = "inventory";
pub const TOTAL_LIABILITIES: &str = "total_liabilities";
pub const CURRENT_LIABILITIES: &str = "current_liabilities";
pub const LONG_TERM_LIABILITIES: &str = "long_term_liabilities";
pub const TOTAL_EQUITY: &str = "total_equity";
pub const MARKET_CAP: &str = "market_cap";

// Balance sheet derived
pub const CURRENT_RATIO: &str = "current_ratio";
pub const DEBT_TO_EQUITY: &str = "debt_to_equity";
pub const DEBT_TO_ASSET: &str = "debt_to_asset";
pub const WORKING_CAPITAL: &str = "working_capital";

/// Suffix appended to comparative (period-over-period) columns.
pub const PCT_CHANGE_SUFFIX: &str = "_pct_change";
