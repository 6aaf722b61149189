use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ingest::StatementKind;

/// Every intent the engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    NormalizeData,
    ProjectCashFlow,
    BuildProfitAndLoss,
    AnalyzeBalanceSheet,
    ComputeRatios,
    RunScenarios,
    AnalyzeVariance,
    AnalyzeInvestment,
    AnalyzeBreakEven,
    AnalyzeGrowth,
    KeyMetrics,
}

/// Where an injected dataset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetSource {
    /// Always the dataset of this statement type
    Fixed(StatementKind),
    /// The statement type named by another parameter
    NamedBy(&'static str),
}

/// A parameter that is filled from the caller's datasets when absent.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSlot {
    pub param: &'static str,
    pub source: DatasetSource,
}

#[derive(Debug, Clone, Copy)]
pub struct IntentSpec {
    pub kind: IntentKind,
    pub name: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
    pub datasets: &'static [DatasetSlot],
}

const fn fixed(param: &'static str, kind: StatementKind) -> DatasetSlot {
    DatasetSlot {
        param,
        source: DatasetSource::Fixed(kind),
    }
}

pub const REGISTRY: &[IntentSpec] = &[
    IntentSpec {
        kind: IntentKind::NormalizeData,
        name: "normalize_data",
        description: "Clean a raw table into a statement time series",
        required: &["table", "statement"],
        datasets: &[],
    },
    IntentSpec {
        kind: IntentKind::ProjectCashFlow,
        name: "project_cash_flow",
        description: "Project inflows, outflows and net cash flow forward",
        required: &["data", "periods"],
        datasets: &[fixed("data", StatementKind::CashFlow)],
    },
    IntentSpec {
        kind: IntentKind::BuildProfitAndLoss,
        name: "build_profit_and_loss",
        description: "Aggregate income data and derive profits and margins",
        required: &["data"],
        datasets: &[fixed("data", StatementKind::ProfitAndLoss)],
    },
    IntentSpec {
        kind: IntentKind::AnalyzeBalanceSheet,
        name: "analyze_balance_sheet",
        description: "Recompute totals and derive balance sheet ratios",
        required: &["data"],
        datasets: &[fixed("data", StatementKind::BalanceSheet)],
    },
    IntentSpec {
        kind: IntentKind::ComputeRatios,
        name: "compute_ratios",
        description: "Profitability, liquidity, efficiency, leverage and valuation ratios",
        required: &["income", "balance"],
        datasets: &[
            fixed("income", StatementKind::ProfitAndLoss),
            fixed("balance", StatementKind::BalanceSheet),
            fixed("cash_flow", StatementKind::CashFlow),
        ],
    },
    IntentSpec {
        kind: IntentKind::RunScenarios,
        name: "run_scenarios",
        description: "Probability-weighted comparison of a statement model under overrides",
        required: &["model", "data", "scenarios"],
        datasets: &[DatasetSlot {
            param: "data",
            source: DatasetSource::NamedBy("model"),
        }],
    },
    IntentSpec {
        kind: IntentKind::AnalyzeVariance,
        name: "analyze_variance",
        description: "Actual versus budget variance with significance flags",
        required: &["actual", "budget"],
        datasets: &[fixed("actual", StatementKind::ProfitAndLoss)],
    },
    IntentSpec {
        kind: IntentKind::AnalyzeInvestment,
        name: "analyze_investment",
        description: "NPV, IRR, payback and profitability index for a project",
        required: &["initial_investment", "cash_flows", "discount_rate"],
        datasets: &[],
    },
    IntentSpec {
        kind: IntentKind::AnalyzeBreakEven,
        name: "analyze_break_even",
        description: "Break-even volume, revenue and cost-volume-profit curve",
        required: &["fixed_costs", "unit_price", "variable_cost"],
        datasets: &[],
    },
    IntentSpec {
        kind: IntentKind::AnalyzeGrowth,
        name: "analyze_growth",
        description: "Period-over-period growth of each field",
        required: &["data"],
        datasets: &[fixed("data", StatementKind::ProfitAndLoss)],
    },
    IntentSpec {
        kind: IntentKind::KeyMetrics,
        name: "key_metrics",
        description: "Latest-period headline metrics",
        required: &["income", "balance"],
        datasets: &[
            fixed("income", StatementKind::ProfitAndLoss),
            fixed("balance", StatementKind::BalanceSheet),
        ],
    },
];

/// Find an intent by its identifier.
pub fn lookup(name: &str) -> Option<&'static IntentSpec> {
    REGISTRY.iter().find(|spec| spec.name == name)
}

impl IntentKind {
    /// Registry entries are listed in variant order.
    pub fn spec(self) -> &'static IntentSpec {
        &REGISTRY[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
