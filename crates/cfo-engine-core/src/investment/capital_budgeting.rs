use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::{EngineError, OrOverflow};
use crate::time_value::{discounted_flows, irr, npv, IrrOutcome};
use crate::types::{with_metadata, ComputationOutput, Figure, Money, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// A capital project: an outlay at t = 0 followed by period cash flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentInput {
    /// Positive amount spent at t = 0
    pub initial_investment: Money,
    /// Cash flows for periods 1..=n
    pub cash_flows: Vec<Money>,
    /// Per-period discount rate
    pub discount_rate: Rate,
}

/// When the cumulative cash flow turns non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Payback {
    /// Fractional number of periods until the outlay is recovered
    Recovered { periods: Decimal },
    NotRecovered,
}

impl Payback {
    pub fn periods(&self) -> Option<Decimal> {
        match self {
            Payback::Recovered { periods } => Some(*periods),
            Payback::NotRecovered => None,
        }
    }
}

/// Accept only when NPV is strictly positive; NPV of exactly zero rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn from_npv(npv: Money) -> Self {
        if npv > Decimal::ZERO {
            Decision::Accept
        } else {
            Decision::Reject
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accept => write!(f, "Accept"),
            Decision::Reject => write!(f, "Reject"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentOutput {
    pub npv: Money,
    pub irr: IrrOutcome,
    pub payback: Payback,
    pub discounted_payback: Payback,
    /// (NPV + I) / I; undefined when I is zero
    pub profitability_index: Figure,
    pub decision: Decision,
    /// Full sequence including the outlay at t = 0
    pub cash_flows: Vec<Money>,
    pub discounted_cash_flows: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// NPV, IRR, payback, discounted payback and profitability index for one
/// project, plus the accept/reject decision.
pub fn analyze_investment(
    input: &InvestmentInput,
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<InvestmentOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(input)?;

    let mut flows = Vec::with_capacity(input.cash_flows.len() + 1);
    flows.push(-input.initial_investment);
    flows.extend_from_slice(&input.cash_flows);

    let npv_value = npv(input.discount_rate, &flows)?;
    let discounted = discounted_flows(input.discount_rate, &flows)?;
    let irr_outcome = irr(&flows, config.irr_max_iterations, config.irr_tolerance)?;

    match &irr_outcome {
        IrrOutcome::NoSignChange => {
            warnings.push("Cash flows never change sign; no IRR exists".to_string())
        }
        IrrOutcome::NoRootFound => {
            warnings.push("No IRR found in the searched rate range".to_string())
        }
        IrrOutcome::NotConverged { iterations, .. } => warnings.push(format!(
            "IRR search stopped after {iterations} iterations without converging"
        )),
        IrrOutcome::Computed { .. } => {}
    }

    let payback = payback_period(&flows)?;
    let discounted_payback = payback_period(&discounted)?;
    if payback == Payback::NotRecovered {
        warnings.push("Initial investment is never recovered".to_string());
    }

    let recovered_value = npv_value
        .checked_add(input.initial_investment)
        .or_overflow("profitability_index")?;
    let profitability_index = Figure::divide(recovered_value, input.initial_investment);
    if profitability_index.is_undefined() {
        warnings.push("Initial investment is zero; profitability index is undefined".to_string());
    }

    let output = InvestmentOutput {
        npv: npv_value,
        irr: irr_outcome,
        payback,
        discounted_payback,
        profitability_index,
        decision: Decision::from_npv(npv_value),
        cash_flows: flows,
        discounted_cash_flows: discounted,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discounted cash flow capital budgeting (NPV, IRR, payback, PI)",
        &serde_json::json!({
            "initial_investment": input.initial_investment.to_string(),
            "discount_rate": input.discount_rate.to_string(),
            "periods": input.cash_flows.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// First period where the running total turns non-negative, interpolated
/// as `(t - 1) + deficit_{t-1} / flow_t`. `flows[0]` is the outlay at t = 0.
pub fn payback_period(flows: &[Money]) -> EngineResult<Payback> {
    let Some(first) = flows.first() else {
        return Ok(Payback::NotRecovered);
    };
    let mut cumulative = *first;
    if cumulative >= Decimal::ZERO {
        return Ok(Payback::Recovered {
            periods: Decimal::ZERO,
        });
    }

    for (t, flow) in flows.iter().enumerate().skip(1) {
        let previous = cumulative;
        cumulative = cumulative.checked_add(*flow).or_overflow("cash_flows")?;
        if cumulative >= Decimal::ZERO {
            // previous < 0 <= cumulative, so flow > 0
            let fraction = (-previous).checked_div(*flow).or_overflow("cash_flows")?;
            return Ok(Payback::Recovered {
                periods: Decimal::from(t - 1) + fraction,
            });
        }
    }
    Ok(Payback::NotRecovered)
}

fn validate(input: &InvestmentInput) -> EngineResult<()> {
    if input.cash_flows.is_empty() {
        return Err(EngineError::validation(
            "cash_flows",
            "At least one period cash flow is required",
        ));
    }
    if input.initial_investment < Decimal::ZERO {
        return Err(EngineError::validation(
            "initial_investment",
            "Initial investment cannot be negative",
        ));
    }
    if input.discount_rate <= -Decimal::ONE {
        return Err(EngineError::validation(
            "discount_rate",
            "Discount rate must be greater than -100%",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn annuity_case() -> InvestmentInput {
        InvestmentInput {
            initial_investment: dec!(100000),
            cash_flows: vec![dec!(30000); 5],
            discount_rate: dec!(0.10),
        }
    }

    fn run(input: &InvestmentInput) -> ComputationOutput<InvestmentOutput> {
        analyze_investment(input, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_annuity_project() {
        let out = run(&annuity_case()).result;
        assert_eq!(out.npv.round_dp(2), dec!(13723.60));
        assert_eq!(out.decision, Decision::Accept);
        assert_eq!(out.payback.periods().map(|p| p.round_dp(2)), Some(dec!(3.33)));
        let rate = out.irr.rate().unwrap();
        assert!((rate - dec!(0.1524)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_discounted_payback_is_later() {
        let out = run(&annuity_case()).result;
        let simple = out.payback.periods().unwrap();
        let discounted = out.discounted_payback.periods().unwrap();
        assert!(discounted > simple);
        assert!(discounted < dec!(5));
    }

    #[test]
    fn test_profitability_index() {
        let out = run(&annuity_case()).result;
        assert_eq!(
            out.profitability_index.value().map(|v| v.round_dp(4)),
            Some(dec!(1.1372))
        );
    }

    #[test]
    fn test_zero_npv_rejects() {
        let input = InvestmentInput {
            initial_investment: dec!(100),
            cash_flows: vec![dec!(110)],
            discount_rate: dec!(0.10),
        };
        let out = run(&input).result;
        assert_eq!(out.npv, dec!(0));
        assert_eq!(out.decision, Decision::Reject);
    }

    #[test]
    fn test_not_recovered() {
        let input = InvestmentInput {
            initial_investment: dec!(1000),
            cash_flows: vec![dec!(100), dec!(100)],
            discount_rate: dec!(0.05),
        };
        let out = run(&input);
        assert_eq!(out.result.payback, Payback::NotRecovered);
        assert_eq!(out.result.discounted_payback, Payback::NotRecovered);
        assert_eq!(out.result.decision, Decision::Reject);
        assert!(out.warnings.iter().any(|w| w.contains("never recovered")));
    }

    #[test]
    fn test_zero_investment_pi_undefined() {
        let input = InvestmentInput {
            initial_investment: dec!(0),
            cash_flows: vec![dec!(10)],
            discount_rate: dec!(0.1),
        };
        let out = run(&input).result;
        assert!(out.profitability_index.is_undefined());
        assert_eq!(out.irr, IrrOutcome::NoSignChange);
        assert_eq!(out.payback, Payback::Recovered { periods: dec!(0) });
    }

    #[test]
    fn test_input_errors() {
        let mut input = annuity_case();
        input.discount_rate = dec!(-1);
        assert!(analyze_investment(&input, &EngineConfig::default()).is_err());

        let mut input = annuity_case();
        input.initial_investment = dec!(-5);
        assert!(analyze_investment(&input, &EngineConfig::default()).is_err());

        let mut input = annuity_case();
        input.cash_flows.clear();
        assert!(analyze_investment(&input, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_payback_exact_boundary() {
        // Recovered exactly at the end of period 2
        let p = payback_period(&[dec!(-200), dec!(100), dec!(100), dec!(50)]).unwrap();
        assert_eq!(p, Payback::Recovered { periods: dec!(2) });
    }

    #[test]
    fn test_overflowing_profitability_index_is_an_error() {
        let input = InvestmentInput {
            initial_investment: Decimal::MAX,
            cash_flows: vec![Decimal::MAX, Decimal::MAX],
            discount_rate: dec!(0),
        };
        let err = analyze_investment(&input, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_payback_serializes_with_status() {
        let json = serde_json::to_value(Payback::Recovered { periods: dec!(3.5) }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "recovered", "periods": "3.5"}));
    }
}
