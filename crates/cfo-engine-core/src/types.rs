use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 2.5x current ratio)
pub type Multiple = Decimal;

/// Variable overrides applied to a base model for one scenario.
pub type Overrides = BTreeMap<String, Decimal>;

// ---------------------------------------------------------------------------
// Figure: a number or an explicit undefined marker
// ---------------------------------------------------------------------------

/// A single numeric cell of a statement or report.
///
/// `Undefined` marks a value that cannot be computed (zero denominator, no
/// prior period, missing component). It propagates through arithmetic
/// instead of aborting the computation, and serializes as JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Figure {
    Value(Decimal),
    #[default]
    Undefined,
}

impl Figure {
    pub const ZERO: Figure = Figure::Value(Decimal::ZERO);

    pub fn value(self) -> Option<Decimal> {
        match self {
            Figure::Value(v) => Some(v),
            Figure::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Figure::Undefined)
    }

    /// `numerator / denominator`, undefined when the denominator is zero.
    pub fn divide(numerator: Decimal, denominator: Decimal) -> Figure {
        if denominator.is_zero() {
            return Figure::Undefined;
        }
        numerator
            .checked_div(denominator)
            .map_or(Figure::Undefined, Figure::Value)
    }

    /// Ratio of two figures; undefined if either side is undefined or the
    /// denominator is zero.
    pub fn ratio(numerator: Figure, denominator: Figure) -> Figure {
        match (numerator, denominator) {
            (Figure::Value(n), Figure::Value(d)) => Figure::divide(n, d),
            _ => Figure::Undefined,
        }
    }

    /// `(current - prior) / prior`
    pub fn pct_change(current: Figure, prior: Figure) -> Figure {
        Figure::ratio(current - prior, prior)
    }

    pub fn abs(self) -> Figure {
        match self {
            Figure::Value(v) => Figure::Value(v.abs()),
            Figure::Undefined => Figure::Undefined,
        }
    }

    /// Round for presentation; undefined stays undefined.
    pub fn round_dp(self, dp: u32) -> Figure {
        match self {
            Figure::Value(v) => Figure::Value(v.round_dp(dp)),
            Figure::Undefined => Figure::Undefined,
        }
    }
}

impl From<Decimal> for Figure {
    fn from(v: Decimal) -> Self {
        Figure::Value(v)
    }
}

impl From<Option<Decimal>> for Figure {
    fn from(v: Option<Decimal>) -> Self {
        v.map_or(Figure::Undefined, Figure::Value)
    }
}

fn lift(a: Figure, b: Figure, op: impl Fn(Decimal, Decimal) -> Option<Decimal>) -> Figure {
    match (a, b) {
        (Figure::Value(x), Figure::Value(y)) => op(x, y).map_or(Figure::Undefined, Figure::Value),
        _ => Figure::Undefined,
    }
}

impl Add for Figure {
    type Output = Figure;
    fn add(self, rhs: Figure) -> Figure {
        lift(self, rhs, |x, y| x.checked_add(y))
    }
}

impl Sub for Figure {
    type Output = Figure;
    fn sub(self, rhs: Figure) -> Figure {
        lift(self, rhs, |x, y| x.checked_sub(y))
    }
}

impl Mul for Figure {
    type Output = Figure;
    fn mul(self, rhs: Figure) -> Figure {
        lift(self, rhs, |x, y| x.checked_mul(y))
    }
}

impl Mul<Decimal> for Figure {
    type Output = Figure;
    fn mul(self, rhs: Decimal) -> Figure {
        self * Figure::Value(rhs)
    }
}

impl Neg for Figure {
    type Output = Figure;
    fn neg(self) -> Figure {
        match self {
            Figure::Value(v) => Figure::Value(-v),
            Figure::Undefined => Figure::Undefined,
        }
    }
}

impl std::iter::Sum for Figure {
    fn sum<I: Iterator<Item = Figure>>(iter: I) -> Figure {
        iter.fold(Figure::ZERO, |acc, f| acc + f)
    }
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Figure::Value(v) => write!(f, "{v}"),
            Figure::Undefined => write!(f, "undefined"),
        }
    }
}

impl Serialize for Figure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Figure::Value(v) => Serialize::serialize(v, serializer),
            Figure::Undefined => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Figure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Decimal>::deserialize(deserializer).map(Figure::from)
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Scenario definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub probability: Rate,
    #[serde(default, alias = "variable_overrides")]
    pub overrides: Overrides,
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
