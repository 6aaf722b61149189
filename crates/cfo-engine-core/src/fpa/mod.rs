pub mod breakeven;
pub mod variance;

pub use breakeven::{analyze_break_even, BreakEvenInput, BreakEvenOutput};
pub use variance::{analyze_variance, VarianceInput, VarianceReport};
