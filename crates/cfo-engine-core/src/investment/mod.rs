pub mod capital_budgeting;

pub use capital_budgeting::{
    analyze_investment, payback_period, Decision, InvestmentInput, InvestmentOutput, Payback,
};
