pub mod balance_sheet;
pub mod cash_flow;
pub mod profit_loss;

pub use balance_sheet::{analyze_balance_sheet, BalanceSheetInput};
pub use cash_flow::{project_cash_flow, CashFlowInput};
pub use profit_loss::{build_profit_and_loss, Granularity, ProfitLossInput};
