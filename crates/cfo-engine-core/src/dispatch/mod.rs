//! Single entry point for callers: `{intent, parameters}` in, a structured
//! success or failure response out.
//!
//! The dispatcher holds no state between calls. Everything a call may use
//! (configuration, the caller's normalized datasets, an optional shared
//! dataset cache) travels in the [`DispatchContext`].

pub mod intent;
pub mod registry;

pub use intent::{Intent, Outcome};
pub use registry::{lookup, DatasetSource, DatasetSlot, IntentKind, IntentSpec, REGISTRY};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ingest::{DatasetCache, NormalizedDataset, StatementKind};
use crate::series::{TimeSeries, UndefinedCell};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub intent: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl DispatchRequest {
    pub fn new(intent: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            intent: intent.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Stable identifier, see [`EngineError::kind`]
    pub kind: String,
    pub message: String,
    /// Parameter names, for missing-parameter failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

impl From<&EngineError> for FailureDetail {
    fn from(e: &EngineError) -> Self {
        let missing = match e {
            EngineError::MissingParameter { missing, .. } => missing.clone(),
            _ => Vec::new(),
        };
        FailureDetail {
            kind: e.kind().to_string(),
            message: e.to_string(),
            missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub status: Status,
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undefined: Vec<UndefinedCell>,
}

impl DispatchResponse {
    fn success(intent: &str, outcome: Outcome) -> Self {
        DispatchResponse {
            status: Status::Success,
            intent: intent.to_string(),
            result: Some(outcome.result),
            error: None,
            excluded: outcome.excluded,
            undefined: outcome.undefined,
        }
    }

    fn failure(intent: &str, error: &EngineError) -> Self {
        DispatchResponse {
            status: Status::Failure,
            intent: intent.to_string(),
            result: None,
            error: Some(FailureDetail::from(error)),
            excluded: None,
            undefined: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-call inputs that are not part of the parameters.
pub struct DispatchContext<'a> {
    config: &'a EngineConfig,
    datasets: BTreeMap<StatementKind, TimeSeries>,
    cache: Option<&'a DatasetCache>,
}

impl<'a> DispatchContext<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            datasets: BTreeMap::new(),
            cache: None,
        }
    }

    /// Offer `series` as the caller's dataset for a statement type.
    pub fn with_dataset(mut self, kind: StatementKind, series: TimeSeries) -> Self {
        self.datasets.insert(kind, series);
        self
    }

    pub fn with_normalized(self, dataset: &NormalizedDataset) -> Self {
        self.with_dataset(dataset.statement, dataset.series.clone())
    }

    /// `normalize_data` calls that name a `source_id` go through this cache.
    pub fn with_cache(mut self, cache: &'a DatasetCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    pub fn dataset(&self, kind: StatementKind) -> Option<&TimeSeries> {
        self.datasets.get(&kind)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Execute one request. Never fails: every error becomes a failure response.
pub fn dispatch(request: &DispatchRequest, ctx: &DispatchContext<'_>) -> DispatchResponse {
    debug!(intent = %request.intent, parameters = request.parameters.len(), "dispatching");
    match route(request, ctx) {
        Ok(outcome) => {
            debug!(
                intent = %request.intent,
                undefined = outcome.undefined.len(),
                excluded = outcome.excluded.is_some(),
                "dispatch succeeded"
            );
            DispatchResponse::success(&request.intent, outcome)
        }
        Err(e) => {
            warn!(intent = %request.intent, kind = e.kind(), error = %e, "dispatch failed");
            DispatchResponse::failure(&request.intent, &e)
        }
    }
}

/// [`dispatch`] for a request that has not been parsed yet.
pub fn dispatch_value(request: Value, ctx: &DispatchContext<'_>) -> DispatchResponse {
    let intent = request
        .get("intent")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match serde_json::from_value::<DispatchRequest>(request) {
        Ok(request) => dispatch(&request, ctx),
        Err(e) => {
            let e = EngineError::validation("request", format!("Expected {{intent, parameters}}: {e}"));
            warn!(intent = %intent, error = %e, "malformed dispatch request");
            DispatchResponse::failure(&intent, &e)
        }
    }
}

fn route(request: &DispatchRequest, ctx: &DispatchContext<'_>) -> EngineResult<Outcome> {
    let spec = lookup(&request.intent).ok_or_else(|| EngineError::UnsupportedFunction(request.intent.clone()))?;

    let mut parameters = request.parameters.clone();
    inject_datasets(spec, &mut parameters, ctx)?;

    let missing: Vec<String> = spec
        .required
        .iter()
        .filter(|key| is_absent(&parameters, key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MissingParameter {
            intent: spec.name.to_string(),
            missing,
        });
    }

    let intent = Intent::from_parameters(spec.kind, parameters)?;
    intent.execute(ctx.config, ctx.cache)
}

fn is_absent(parameters: &Map<String, Value>, key: &str) -> bool {
    parameters.get(key).map_or(true, Value::is_null)
}

/// Fill dataset parameters the caller left out from the context.
fn inject_datasets(
    spec: &IntentSpec,
    parameters: &mut Map<String, Value>,
    ctx: &DispatchContext<'_>,
) -> EngineResult<()> {
    for slot in spec.datasets {
        if !is_absent(parameters, slot.param) {
            continue;
        }
        let kind = match slot.source {
            DatasetSource::Fixed(kind) => Some(kind),
            // An unreadable statement name is reported by typed validation
            DatasetSource::NamedBy(key) => parameters
                .get(key)
                .and_then(|v| serde_json::from_value::<StatementKind>(v.clone()).ok()),
        };
        let Some(kind) = kind else { continue };
        if let Some(series) = ctx.dataset(kind) {
            debug!(intent = spec.name, param = slot.param, %kind, "injecting caller dataset");
            parameters.insert(slot.param.to_string(), serde_json::to_value(series)?);
        }
    }
    Ok(())
}
