//! Built-in base models: the three statement builders, each re-run under a
//! scenario's overrides.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::scenario::{run_scenarios, ScenarioModel, ScenarioOutput, ScenarioSet};
use crate::config::{EngineConfig, GrowthAssumptions};
use crate::error::EngineError;
use crate::ingest::StatementKind;
use crate::series::TimeSeries;
use crate::statements::balance_sheet::{derive_balance, with_pct_change};
use crate::statements::cash_flow::{check_horizon, project};
use crate::statements::profit_loss::{aggregate, derive_income, Granularity};
use crate::types::{ComputationOutput, Overrides};
use crate::EngineResult;

/// Overrides the cash-flow model reads as settings rather than categories.
pub const DEFAULT_RATE_KEY: &str = "default_rate";
pub const PERIODS_KEY: &str = "periods";

// ---------------------------------------------------------------------------
// Cash flow projection
// ---------------------------------------------------------------------------

/// Overrides: `default_rate`, `periods`, otherwise category → growth rate.
pub struct CashFlowModel<'a> {
    pub history: &'a TimeSeries,
    pub growth: GrowthAssumptions,
    pub periods: u32,
    /// Upper bound on `periods`, including overridden horizons
    pub max_periods: u32,
}

impl ScenarioModel for CashFlowModel<'_> {
    fn run(&self, overrides: &Overrides) -> EngineResult<TimeSeries> {
        let mut growth = self.growth.clone();
        let mut periods = self.periods;

        for (key, value) in overrides {
            match key.as_str() {
                DEFAULT_RATE_KEY => growth.default_rate = *value,
                PERIODS_KEY => periods = whole_periods(*value)?,
                category => {
                    if !self.history.has_field(category) {
                        return Err(EngineError::validation(
                            category,
                            "Override names a category that is not in the history",
                        ));
                    }
                    growth.rates.insert(category.to_string(), *value);
                }
            }
        }

        check_horizon(periods, self.max_periods)?;
        let (projection, _) = project(self.history, &growth, periods)?;
        Ok(projection.series)
    }
}

fn whole_periods(value: Decimal) -> EngineResult<u32> {
    if value.fract().is_zero() {
        if let Some(n) = value.to_u32() {
            return Ok(n);
        }
    }
    Err(EngineError::validation(
        PERIODS_KEY,
        format!("Period override must be a non-negative whole number (got {value})"),
    ))
}

// ---------------------------------------------------------------------------
// Profit & loss / balance sheet
// ---------------------------------------------------------------------------

/// Multiply each named input field by its override before rebuilding.
fn scaled(data: &TimeSeries, overrides: &Overrides) -> EngineResult<TimeSeries> {
    let mut out = data.clone();
    for (field, factor) in overrides {
        if !data.has_field(field) {
            return Err(EngineError::validation(
                field.clone(),
                "Override names a field that is not in the data",
            ));
        }
        out.scale_field(field, *factor);
    }
    Ok(out)
}

/// Overrides: input field → multiplicative scale.
pub struct ProfitLossModel<'a> {
    pub data: &'a TimeSeries,
    pub granularity: Option<Granularity>,
}

impl ScenarioModel for ProfitLossModel<'_> {
    fn run(&self, overrides: &Overrides) -> EngineResult<TimeSeries> {
        let data = scaled(self.data, overrides)?;
        let data = match self.granularity {
            Some(g) => aggregate(&data, g).0,
            None => data,
        };
        Ok(derive_income(&data)?.0)
    }
}

/// Overrides: input field → multiplicative scale.
pub struct BalanceSheetModel<'a> {
    pub data: &'a TimeSeries,
    pub comparative: bool,
}

impl ScenarioModel for BalanceSheetModel<'_> {
    fn run(&self, overrides: &Overrides) -> EngineResult<TimeSeries> {
        let (statement, _) = derive_balance(&scaled(self.data, overrides)?)?;
        Ok(if self.comparative {
            with_pct_change(&statement)
        } else {
            statement
        })
    }
}

// ---------------------------------------------------------------------------
// Request form
// ---------------------------------------------------------------------------

/// A scenario analysis over one of the built-in statement models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAnalysisInput {
    /// Which statement builder is the base model
    pub model: StatementKind,
    /// Normalized data for that statement
    pub data: TimeSeries,
    pub scenarios: ScenarioSet,
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Cash flow: projection horizon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods: Option<u32>,
    /// Cash flow: base growth assumptions; configured defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth: Option<GrowthAssumptions>,
    /// P&L: aggregation bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
    /// Balance sheet: add period-over-period columns
    #[serde(default)]
    pub comparative: bool,
}

pub fn analyze_scenarios(
    input: &ScenarioAnalysisInput,
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<ScenarioOutput>> {
    let scenarios = input.scenarios.clone().into_scenarios();

    match input.model {
        StatementKind::CashFlow => {
            let periods = input.periods.ok_or_else(|| {
                EngineError::validation("periods", "Cash flow model needs a projection horizon")
            })?;
            let model = CashFlowModel {
                history: &input.data,
                growth: input.growth.clone().unwrap_or_else(|| config.growth.clone()),
                periods,
                max_periods: config.max_projection_periods,
            };
            run_scenarios(&model, &scenarios, &input.metrics, config)
        }
        StatementKind::ProfitAndLoss => {
            let model = ProfitLossModel {
                data: &input.data,
                granularity: input.granularity,
            };
            run_scenarios(&model, &scenarios, &input.metrics, config)
        }
        StatementKind::BalanceSheet => {
            let model = BalanceSheetModel {
                data: &input.data,
                comparative: input.comparative,
            };
            run_scenarios(&model, &scenarios, &input.metrics, config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::series::Period;
    use crate::types::{Figure, Scenario};
    use rust_decimal_macros::dec;

    fn history() -> TimeSeries {
        let mut ts = TimeSeries::new();
        ts.insert(Period::Index(1), fields::REVENUE, dec!(1000));
        ts.insert(Period::Index(1), fields::COGS, dec!(400));
        ts
    }

    #[test]
    fn test_cash_flow_overrides() {
        let model = CashFlowModel {
            history: &history(),
            growth: GrowthAssumptions::uniform(dec!(0)),
            periods: 2,
            max_periods: 600,
        };
        let overrides = Overrides::from([
            (fields::REVENUE.to_string(), dec!(0.1)),
            (PERIODS_KEY.to_string(), dec!(3)),
        ]);
        let series = model.run(&overrides).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.get(&Period::Index(1), fields::REVENUE),
            Some(Figure::Value(dec!(1100)))
        );
        assert_eq!(series.get(&Period::Index(1), fields::COGS), Some(Figure::Value(dec!(400))));
    }

    #[test]
    fn test_cash_flow_unknown_category() {
        let model = CashFlowModel {
            history: &history(),
            growth: GrowthAssumptions::default(),
            periods: 1,
            max_periods: 600,
        };
        let overrides = Overrides::from([("marketing".to_string(), dec!(0.1))]);
        assert!(model.run(&overrides).is_err());
    }

    #[test]
    fn test_overridden_horizon_above_limit_rejected() {
        let model = CashFlowModel {
            history: &history(),
            growth: GrowthAssumptions::uniform(dec!(0)),
            periods: 1,
            max_periods: 12,
        };
        let overrides = Overrides::from([(PERIODS_KEY.to_string(), dec!(4000000000))]);
        let err = model.run(&overrides).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "periods"));
    }

    #[test]
    fn test_fractional_periods_rejected() {
        assert!(whole_periods(dec!(2.5)).is_err());
        assert!(whole_periods(dec!(-1)).is_err());
        assert_eq!(whole_periods(dec!(4)).unwrap(), 4);
    }

    #[test]
    fn test_pnl_scaling() {
        let model = ProfitLossModel {
            data: &history(),
            granularity: None,
        };
        let overrides = Overrides::from([(fields::REVENUE.to_string(), dec!(1.5))]);
        let s = model.run(&overrides).unwrap();
        // 1500 - 400
        assert_eq!(s.get(&Period::Index(1), fields::GROSS_PROFIT), Some(Figure::Value(dec!(1100))));
    }

    #[test]
    fn test_pnl_unknown_field() {
        let model = ProfitLossModel {
            data: &history(),
            granularity: None,
        };
        let overrides = Overrides::from([("headcount".to_string(), dec!(2))]);
        assert!(matches!(model.run(&overrides), Err(EngineError::Validation { .. })));
    }

    #[test]
    fn test_analysis_over_pnl_model() {
        let input = ScenarioAnalysisInput {
            model: StatementKind::ProfitAndLoss,
            data: history(),
            scenarios: ScenarioSet::List(vec![
                Scenario {
                    name: "best".into(),
                    probability: dec!(0.2),
                    overrides: Overrides::from([(fields::REVENUE.to_string(), dec!(1.2))]),
                },
                Scenario {
                    name: "worst".into(),
                    probability: dec!(0.8),
                    overrides: Overrides::from([(fields::REVENUE.to_string(), dec!(0.8))]),
                },
            ]),
            metrics: vec![fields::REVENUE.to_string()],
            periods: None,
            growth: None,
            granularity: None,
            comparative: false,
        };
        let out = analyze_scenarios(&input, &EngineConfig::default()).unwrap();
        // 0.2 * 1200 + 0.8 * 800
        assert_eq!(out.result.comparison[0].weighted, Figure::Value(dec!(880)));
    }

    #[test]
    fn test_cash_flow_model_needs_periods() {
        let input = ScenarioAnalysisInput {
            model: StatementKind::CashFlow,
            data: history(),
            scenarios: ScenarioSet::List(vec![]),
            metrics: vec![],
            periods: None,
            growth: None,
            granularity: None,
            comparative: false,
        };
        assert!(analyze_scenarios(&input, &EngineConfig::default()).is_err());
    }
}
