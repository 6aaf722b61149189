use thiserror::Error;

use crate::EngineResult;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Missing parameter(s) for '{intent}': {}", missing.join(", "))]
    MissingParameter { intent: String, missing: Vec<String> },

    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Shorthand for the most common failure: a bad or missing input field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// A decimal operation on `field` left the representable range.
    pub fn overflow(field: impl Into<String>) -> Self {
        EngineError::validation(field, "Result exceeds the representable decimal range")
    }

    /// Stable, machine-readable identifier used in dispatch failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "validation_error",
            EngineError::InsufficientData(_) => "insufficient_data_error",
            EngineError::SchemaMismatch(_) => "schema_mismatch_error",
            EngineError::MissingParameter { .. } => "missing_parameter_error",
            EngineError::UnsupportedFunction(_) => "unsupported_function_error",
            EngineError::Config(_) => "config_error",
            EngineError::Serialization(_) => "serialization_error",
        }
    }
}

/// Converts a `checked_*` decimal result into an overflow failure.
pub(crate) trait OrOverflow<T> {
    fn or_overflow(self, field: &str) -> EngineResult<T>;
}

impl<T> OrOverflow<T> for Option<T> {
    fn or_overflow(self, field: &str) -> EngineResult<T> {
        self.ok_or_else(|| EngineError::overflow(field))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}
