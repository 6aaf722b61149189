pub mod growth;
pub mod key_metrics;
pub mod ratios;

pub use growth::{analyze_growth, period_over_period_growth, GrowthInput};
pub use key_metrics::{key_metrics, KeyMetrics, KeyMetricsInput};
pub use ratios::{compute_ratios, RatioInput, RatioReport};
