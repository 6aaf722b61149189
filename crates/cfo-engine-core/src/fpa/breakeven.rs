use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::{EngineError, OrOverflow};
use crate::types::{with_metadata, ComputationOutput, Figure, Money, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types: break-even analysis
// ---------------------------------------------------------------------------

/// Input for break-even and operating leverage analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenInput {
    /// Total fixed costs
    pub fixed_costs: Money,
    /// Selling price per unit
    pub unit_price: Money,
    /// Variable cost per unit
    pub variable_cost: Money,
    /// Current units sold, for margin of safety and operating leverage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_volume: Option<Decimal>,
    /// Profit target for target-volume calculation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_profit: Option<Money>,
    /// Overrides the configured curve resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve_steps: Option<u32>,
}

/// One sample of the cost-volume-profit chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub units: Decimal,
    pub revenue: Money,
    pub total_cost: Money,
    pub profit: Money,
}

/// Figures that depend on a current sales volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAnalysis {
    pub current_volume: Decimal,
    /// CM * volume - FC
    pub current_profit: Money,
    /// current_volume - break_even_units
    pub margin_of_safety_units: Decimal,
    /// MOS / current_volume
    pub margin_of_safety_pct: Figure,
    /// Degree of operating leverage: CM * volume / profit
    pub operating_leverage: Figure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvenOutput {
    /// Price - variable cost per unit
    pub contribution_margin: Money,
    /// CM / price
    pub contribution_margin_ratio: Rate,
    /// Fixed costs / contribution margin
    pub break_even_units: Decimal,
    /// break_even_units * price
    pub break_even_revenue: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeAnalysis>,
    /// (FC + target_profit) / CM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_volume: Option<Decimal>,
    /// Samples over [0, 2 × break-even units]
    pub curve: Vec<CurvePoint>,
}

// ---------------------------------------------------------------------------
// Function: analyze_break_even
// ---------------------------------------------------------------------------

/// Compute break-even point, the chart curve, and (given a current volume)
/// margin of safety and degree of operating leverage.
pub fn analyze_break_even(
    input: &BreakEvenInput,
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<BreakEvenOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // --- Validate inputs ---
    if input.unit_price <= dec!(0) {
        return Err(EngineError::validation(
            "unit_price",
            "Unit price must be positive",
        ));
    }
    if input.variable_cost < dec!(0) {
        return Err(EngineError::validation(
            "variable_cost",
            "Variable cost per unit cannot be negative",
        ));
    }
    if input.fixed_costs < dec!(0) {
        return Err(EngineError::validation(
            "fixed_costs",
            "Fixed costs cannot be negative",
        ));
    }

    let contribution_margin = input.unit_price - input.variable_cost;
    if contribution_margin <= dec!(0) {
        return Err(EngineError::validation(
            "contribution_margin",
            "Contribution margin is zero or negative; break-even is unreachable",
        ));
    }

    let steps = input.curve_steps.unwrap_or(config.break_even_curve_steps);
    if steps == 0 || steps > config.max_curve_steps {
        return Err(EngineError::validation(
            "curve_steps",
            format!("Curve needs between 1 and {} steps", config.max_curve_steps),
        ));
    }

    let contribution_margin_ratio = contribution_margin
        .checked_div(input.unit_price)
        .or_overflow("contribution_margin_ratio")?;
    let break_even_units = input
        .fixed_costs
        .checked_div(contribution_margin)
        .or_overflow("break_even_units")?;
    let break_even_revenue = break_even_units
        .checked_mul(input.unit_price)
        .or_overflow("break_even_revenue")?;

    // --- Current volume ---
    let volume = input
        .current_volume
        .map(|v| -> EngineResult<VolumeAnalysis> {
            let contribution = contribution_margin.checked_mul(v).or_overflow("current_volume")?;
            let current_profit = contribution
                .checked_sub(input.fixed_costs)
                .or_overflow("current_volume")?;
            let margin_of_safety_units = v.checked_sub(break_even_units).or_overflow("current_volume")?;
            let margin_of_safety_pct = Figure::divide(margin_of_safety_units, v);
            if margin_of_safety_pct.is_undefined() {
                warnings.push("Current volume is zero; margin of safety is undefined".to_string());
            }
            let operating_leverage = Figure::divide(contribution, current_profit);
            if operating_leverage.is_undefined() {
                warnings.push("Current profit is zero; operating leverage is undefined".to_string());
            }
            Ok(VolumeAnalysis {
                current_volume: v,
                current_profit,
                margin_of_safety_units,
                margin_of_safety_pct,
                operating_leverage,
            })
        })
        .transpose()?;

    let target_volume = input
        .target_profit
        .map(|tp| {
            input
                .fixed_costs
                .checked_add(tp)
                .and_then(|required| required.checked_div(contribution_margin))
                .or_overflow("target_profit")
        })
        .transpose()?;

    // --- Chart curve ---
    let curve = if break_even_units.is_zero() {
        warnings.push("Fixed costs are zero; break-even is at zero units".to_string());
        vec![curve_point(input, Decimal::ZERO)?]
    } else {
        let upper = break_even_units.checked_mul(dec!(2)).or_overflow("break_even_units")?;
        let step_count = Decimal::from(steps);
        (0..=steps)
            .map(|i| {
                let units = upper
                    .checked_mul(Decimal::from(i))
                    .and_then(|u| u.checked_div(step_count))
                    .or_overflow("curve")?;
                curve_point(input, units)
            })
            .collect::<EngineResult<Vec<_>>>()?
    };

    let output = BreakEvenOutput {
        contribution_margin,
        contribution_margin_ratio,
        break_even_units,
        break_even_revenue,
        volume,
        target_volume,
        curve,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Break-even Analysis with Operating Leverage",
        &serde_json::json!({
            "unit_price": input.unit_price.to_string(),
            "variable_cost": input.variable_cost.to_string(),
            "fixed_costs": input.fixed_costs.to_string(),
            "curve_steps": steps,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn curve_point(input: &BreakEvenInput, units: Decimal) -> EngineResult<CurvePoint> {
    let revenue = units.checked_mul(input.unit_price).or_overflow("curve")?;
    let total_cost = units
        .checked_mul(input.variable_cost)
        .and_then(|variable| variable.checked_add(input.fixed_costs))
        .or_overflow("curve")?;
    Ok(CurvePoint {
        units,
        revenue,
        total_cost,
        profit: revenue.checked_sub(total_cost).or_overflow("curve")?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
