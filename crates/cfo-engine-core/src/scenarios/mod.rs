pub mod models;
pub mod scenario;

pub use models::{analyze_scenarios, ScenarioAnalysisInput};
pub use scenario::{run_scenarios, ScenarioModel, ScenarioOutput, ScenarioSet};
