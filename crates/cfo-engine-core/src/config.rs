//! Engine configuration.
//!
//! Every tunable the engine uses lives in [`EngineConfig`] and is passed
//! explicitly into each call. There is no module-level default that can be
//! changed at runtime.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::EngineError;
use crate::types::Rate;
use crate::EngineResult;

/// Category → growth rate, with an explicit fallback for unlisted categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthAssumptions {
    #[serde(default)]
    pub rates: BTreeMap<String, Rate>,
    pub default_rate: Rate,
}

impl GrowthAssumptions {
    pub fn uniform(default_rate: Rate) -> Self {
        Self {
            rates: BTreeMap::new(),
            default_rate,
        }
    }

    pub fn with_rate(mut self, category: impl Into<String>, rate: Rate) -> Self {
        self.rates.insert(category.into(), rate);
        self
    }

    /// Rate for a category, falling back to the default.
    pub fn rate_for(&self, category: &str) -> Rate {
        self.rates
            .get(category)
            .copied()
            .unwrap_or(self.default_rate)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.default_rate <= dec!(-1) {
            return Err(EngineError::validation(
                "growth.default_rate",
                "Growth rate must be greater than -100%",
            ));
        }
        for (category, rate) in &self.rates {
            if *rate <= dec!(-1) {
                return Err(EngineError::validation(
                    format!("growth.{category}"),
                    "Growth rate must be greater than -100%",
                ));
            }
        }
        Ok(())
    }
}

impl Default for GrowthAssumptions {
    fn default() -> Self {
        Self {
            rates: BTreeMap::from([
                ("revenue".to_string(), dec!(0.05)),
                ("cogs".to_string(), dec!(0.03)),
                ("operating_expense".to_string(), dec!(0.03)),
                ("capital_expenditure".to_string(), dec!(0.02)),
            ]),
            default_rate: dec!(0.03),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Growth assumptions used when a projection request supplies none.
    pub growth: GrowthAssumptions,
    /// Variance-percent magnitude above which a deviation is flagged.
    pub variance_threshold: Rate,
    /// Allowed distance of the scenario probability sum from 1.
    pub probability_tolerance: Decimal,
    /// Upper bound on IRR root-finding iterations.
    pub irr_max_iterations: u32,
    /// |NPV| below which the IRR search stops.
    pub irr_tolerance: Decimal,
    /// Number of steps in the break-even chart curve.
    pub break_even_curve_steps: u32,
    /// Largest curve resolution a request may ask for.
    pub max_curve_steps: u32,
    /// Largest cash flow projection horizon a request may ask for.
    pub max_projection_periods: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            growth: GrowthAssumptions::default(),
            variance_threshold: dec!(0.10),
            probability_tolerance: dec!(0.001),
            irr_max_iterations: 200,
            irr_tolerance: dec!(0.000000001),
            break_even_curve_steps: 20,
            max_curve_steps: 1_000,
            max_projection_periods: 600,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read '{}': {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.growth.validate()?;
        if self.variance_threshold < Decimal::ZERO {
            return Err(EngineError::Config(
                "variance_threshold cannot be negative".into(),
            ));
        }
        if self.probability_tolerance < Decimal::ZERO {
            return Err(EngineError::Config(
                "probability_tolerance cannot be negative".into(),
            ));
        }
        if self.irr_max_iterations == 0 {
            return Err(EngineError::Config(
                "irr_max_iterations must be at least 1".into(),
            ));
        }
        if self.irr_tolerance <= Decimal::ZERO {
            return Err(EngineError::Config("irr_tolerance must be positive".into()));
        }
        if self.break_even_curve_steps == 0 {
            return Err(EngineError::Config(
                "break_even_curve_steps must be at least 1".into(),
            ));
        }
        if self.break_even_curve_steps > self.max_curve_steps {
            return Err(EngineError::Config(format!(
                "break_even_curve_steps exceeds max_curve_steps ({})",
                self.max_curve_steps
            )));
        }
        if self.max_projection_periods == 0 {
            return Err(EngineError::Config(
                "max_projection_periods must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
