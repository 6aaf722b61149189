use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Money, Rate};
use crate::EngineResult;

/// Candidate rates scanned for a sign change before bisection starts.
const IRR_SEARCH_GRID: [Decimal; 19] = [
    dec!(-0.99),
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(-0.1),
    dec!(0),
    dec!(0.05),
    dec!(0.1),
    dec!(0.2),
    dec!(0.35),
    dec!(0.5),
    dec!(0.75),
    dec!(1),
    dec!(1.5),
    dec!(2),
    dec!(3),
    dec!(5),
    dec!(10),
];

/// Outcome of the IRR search. Only `Computed` carries a rate; the other
/// variants are distinct "no IRR" results, never a zero rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IrrOutcome {
    Computed { rate: Rate, iterations: u32 },
    /// The cash-flow sequence never changes sign, so NPV has no real root.
    NoSignChange,
    /// Signs change but NPV does not cross zero anywhere in the search range.
    NoRootFound,
    /// The iteration cap was reached before NPV got within tolerance.
    NotConverged { iterations: u32, last_rate: Rate },
}

impl IrrOutcome {
    pub fn rate(&self) -> Option<Rate> {
        match self {
            IrrOutcome::Computed { rate, .. } => Some(*rate),
            _ => None,
        }
    }
}

/// NPV with overflow-checked arithmetic; `None` when a term does not fit.
fn try_npv(rate: Rate, cash_flows: &[Money]) -> Option<Money> {
    let one_plus_r = Decimal::ONE.checked_add(rate)?;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        if discount.is_zero() {
            return None;
        }
        result = result.checked_add(cf.checked_div(discount)?)?;
    }
    Some(result)
}

fn validate_rate(rate: Rate) -> EngineResult<()> {
    if rate <= dec!(-1) {
        return Err(EngineError::validation(
            "discount_rate",
            "Discount rate must be greater than -100%",
        ));
    }
    Ok(())
}

/// Net Present Value of a series of cash flows, the first at t = 0.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> EngineResult<Money> {
    validate_rate(rate)?;
    try_npv(rate, cash_flows).ok_or_else(|| {
        EngineError::validation("cash_flows", "NPV overflowed decimal precision")
    })
}

/// Each cash flow discounted back to t = 0.
pub fn discounted_flows(rate: Rate, cash_flows: &[Money]) -> EngineResult<Vec<Money>> {
    validate_rate(rate)?;
    let one_plus_r = Decimal::ONE
        .checked_add(rate)
        .ok_or_else(|| EngineError::overflow("discount_rate"))?;
    let mut discount = Decimal::ONE;
    let mut out = Vec::with_capacity(cash_flows.len());

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r).ok_or_else(|| {
                EngineError::validation("discount_rate", "Discount factor overflowed")
            })?;
        }
        let pv = cf.checked_div(discount).ok_or_else(|| {
            EngineError::validation("discount_rate", format!("Discount factor at period {t} is not representable"))
        })?;
        out.push(pv);
    }
    Ok(out)
}

/// Number of sign changes in the sequence, ignoring zeros.
pub fn sign_changes(cash_flows: &[Money]) -> usize {
    let signs: Vec<bool> = cash_flows
        .iter()
        .filter(|cf| !cf.is_zero())
        .map(|cf| cf.is_sign_negative())
        .collect();
    signs.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Internal Rate of Return by bracket scan and bisection.
///
/// When the grid has no sign change, the upper rate keeps doubling past the
/// last grid point until NPV crosses zero. Both phases share the
/// `max_iterations` budget; running out yields `NotConverged` rather than
/// blocking.
pub fn irr(cash_flows: &[Money], max_iterations: u32, tolerance: Decimal) -> EngineResult<IrrOutcome> {
    if cash_flows.len() < 2 {
        return Err(EngineError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    if sign_changes(cash_flows) == 0 {
        return Ok(IrrOutcome::NoSignChange);
    }

    let samples: Vec<(Rate, Money)> = IRR_SEARCH_GRID
        .iter()
        .filter_map(|r| try_npv(*r, cash_flows).map(|v| (*r, v)))
        .collect();

    if let Some((rate, _)) = samples.iter().find(|(_, v)| v.abs() < tolerance) {
        return Ok(IrrOutcome::Computed {
            rate: *rate,
            iterations: 0,
        });
    }

    let bracket = samples
        .windows(2)
        .find(|w| w[0].1.is_sign_negative() != w[1].1.is_sign_negative())
        .map(|w| (w[0], w[1].0));

    let mut used = 0;
    let bracket = match bracket {
        Some(b) => Some(b),
        None => match samples.last() {
            Some(last) if last.0 > Decimal::ZERO => {
                extend_upper(*last, cash_flows, max_iterations, &mut used)
            }
            _ => None,
        },
    };

    let Some(((mut lo, mut f_lo), mut hi)) = bracket else {
        if used >= max_iterations {
            let last_rate = samples.last().map(|(r, _)| *r).unwrap_or_default();
            return Ok(IrrOutcome::NotConverged {
                iterations: max_iterations,
                last_rate,
            });
        }
        return Ok(IrrOutcome::NoRootFound);
    };
    let mut mid = lo;

    for i in (used + 1)..=max_iterations {
        mid = lo + (hi - lo) / dec!(2);
        if mid == lo || mid == hi {
            // Bracket is as narrow as decimal precision allows.
            return Ok(IrrOutcome::Computed { rate: mid, iterations: i });
        }

        let Some(f_mid) = try_npv(mid, cash_flows) else {
            break;
        };

        if f_mid.abs() < tolerance {
            return Ok(IrrOutcome::Computed { rate: mid, iterations: i });
        }

        if f_mid.is_sign_negative() == f_lo.is_sign_negative() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Ok(IrrOutcome::NotConverged {
        iterations: max_iterations,
        last_rate: mid,
    })
}

/// Double the rate from `start` until NPV changes sign. Returns the last
/// same-sign sample and the first rate past the crossing.
fn extend_upper(
    start: (Rate, Money),
    cash_flows: &[Money],
    max_iterations: u32,
    used: &mut u32,
) -> Option<((Rate, Money), Rate)> {
    let (mut lo, mut f_lo) = start;
    while *used < max_iterations {
        *used += 1;
        let hi = lo.checked_mul(dec!(2))?;
        let f_hi = try_npv(hi, cash_flows)?;
        if f_hi.is_sign_negative() != f_lo.is_sign_negative() {
            return Some(((lo, f_lo), hi));
        }
        lo = hi;
        f_lo = f_hi;
    }
    None
}
