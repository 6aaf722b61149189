use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EngineError;
use crate::fields;
use crate::series::{Period, TimeSeries};
use crate::statements::balance_sheet::derive_balance;
use crate::statements::profit_loss::derive_income;
use crate::types::{with_metadata, ComputationOutput, Figure};
use crate::EngineResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMetricsInput {
    pub income: TimeSeries,
    pub balance: TimeSeries,
}

/// Headline figures for the most recent period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub income_period: Period,
    pub balance_period: Period,
    pub revenue: Figure,
    pub net_income: Figure,
    pub revenue_growth: Figure,
    pub profit_growth: Figure,
    pub gross_margin: Figure,
    pub net_margin: Figure,
    pub current_ratio: Figure,
    /// Total liabilities / equity
    pub debt_to_equity: Figure,
}

pub fn key_metrics(input: &KeyMetricsInput) -> EngineResult<ComputationOutput<KeyMetrics>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let (income, _) = derive_income(&input.income)?;
    let (balance, _) = derive_balance(&input.balance)?;

    let periods = income.periods();
    let (Some(latest), Some(balance_period)) = (periods.last().copied(), balance.last_period()) else {
        return Err(EngineError::InsufficientData(
            "Key metrics need at least one income and one balance period".into(),
        ));
    };
    if latest != balance_period {
        warnings.push(format!(
            "Latest income period {latest} differs from latest balance period {balance_period}"
        ));
    }

    let previous = periods.len().checked_sub(2).map(|i| periods[i]);
    if previous.is_none() {
        warnings.push("Only one income period; growth is undefined".to_string());
    }
    let growth = |field: &str| match previous {
        Some(prev) => Figure::pct_change(income.figure(&latest, field), income.figure(&prev, field)),
        None => Figure::Undefined,
    };

    let metrics = KeyMetrics {
        income_period: latest,
        balance_period,
        revenue: income.figure(&latest, fields::REVENUE),
        net_income: income.figure(&latest, fields::NET_INCOME),
        revenue_growth: growth(fields::REVENUE),
        profit_growth: growth(fields::NET_INCOME),
        gross_margin: income.figure(&latest, fields::GROSS_MARGIN),
        net_margin: income.figure(&latest, fields::NET_MARGIN),
        current_ratio: balance.figure(&balance_period, fields::CURRENT_RATIO),
        debt_to_equity: balance.figure(&balance_period, fields::DEBT_TO_EQUITY),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Latest-period headline metrics",
        &serde_json::json!({
            "income_periods": input.income.len(),
            "balance_periods": input.balance.len(),
        }),
        warnings,
        elapsed,
        metrics,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn q(i: u32) -> Period {
        Period::Index(i)
    }

    fn income() -> TimeSeries {
        let mut ts = TimeSeries::new();
        let rows = [
            (dec!(150000), dec!(85000), dec!(40000), dec!(2000), dec!(5750)),
            (dec!(180000), dec!(100000), dec!(45000), dec!(2000), dec!(8250)),
        ];
        for (i, (rev, cogs, opex, interest, tax)) in rows.into_iter().enumerate() {
            let p = q(i as u32 + 3);
            ts.insert(p, fields::REVENUE, rev);
            ts.insert(p, fields::COGS, cogs);
            ts.insert(p, fields::OPERATING_EXPENSE, opex);
            ts.insert(p, fields::INTEREST_EXPENSE, interest);
            ts.insert(p, fields::TAX_EXPENSE, tax);
        }
        ts
    }

    fn balance() -> TimeSeries {
        let mut ts = TimeSeries::new();
        ts.insert(q(4), fields::CURRENT_ASSETS, dec!(285000));
        ts.insert(q(4), fields::CURRENT_LIABILITIES, dec!(90000));
        ts.insert(q(4), fields::TOTAL_ASSETS, dec!(500000));
        ts.insert(q(4), fields::TOTAL_LIABILITIES, dec!(175000));
        ts.insert(q(4), fields::TOTAL_EQUITY, dec!(325000));
        ts
    }

    #[test]
    fn test_dashboard_summary() {
        let out = key_metrics(&KeyMetricsInput {
            income: income(),
            balance: balance(),
        })
        .unwrap();
        let m = out.result;
        assert_eq!(m.revenue, Figure::Value(dec!(180000)));
        assert_eq!(m.revenue_growth, Figure::Value(dec!(0.2)));
        // 17250 -> 24750
        assert_eq!(m.net_income, Figure::Value(dec!(24750)));
        assert_eq!(
            m.profit_growth.value().map(|v| v.round_dp(4)),
            Some(dec!(0.4348))
        );
        assert_eq!(
            m.current_ratio.value().map(|v| v.round_dp(2)),
            Some(dec!(3.17))
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_single_period_growth_undefined() {
        let mut inc = TimeSeries::new();
        inc.insert(q(4), fields::REVENUE, dec!(10));
        let out = key_metrics(&KeyMetricsInput {
            income: inc,
            balance: balance(),
        })
        .unwrap();
        assert!(out.result.revenue_growth.is_undefined());
        assert_eq!(out.warnings.len(), 1);
    }
}
