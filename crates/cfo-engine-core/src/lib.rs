pub mod config;
pub mod error;
pub mod fields;
pub mod series;
pub mod time_value;
pub mod types;

pub mod analysis;
pub mod dispatch;
pub mod fpa;
pub mod ingest;
pub mod investment;
pub mod scenarios;
pub mod statements;

pub use config::{EngineConfig, GrowthAssumptions};
pub use error::EngineError;
pub use series::{Period, TimeSeries};
pub use types::*;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
