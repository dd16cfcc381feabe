/*! The log of operations applied to a picker's peaks */
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single logged operation, serialized as a single-key object `{method: parameters}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ProcessingStep {
    pub method: String,
    pub parameters: Value,
}

impl ProcessingStep {
    pub fn new(method: impl Into<String>, parameters: impl Serialize) -> Self {
        let parameters = serde_json::to_value(parameters).unwrap_or_else(|e| {
            tracing::warn!("Failed to record parameters: {e}");
            Value::Null
        });
        Self {
            method: method.into(),
            parameters,
        }
    }
}

impl From<ProcessingStep> for Map<String, Value> {
    fn from(value: ProcessingStep) -> Self {
        let mut map = Map::new();
        map.insert(value.method, value.parameters);
        map
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MalformedProcessingStep(usize);

impl Display for MalformedProcessingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A processing step must have exactly one key, found {}", self.0)
    }
}

impl std::error::Error for MalformedProcessingStep {}

impl TryFrom<Map<String, Value>> for ProcessingStep {
    type Error = MalformedProcessingStep;

    fn try_from(value: Map<String, Value>) -> Result<Self, Self::Error> {
        if value.len() != 1 {
            return Err(MalformedProcessingStep(value.len()));
        }
        match value.into_iter().next() {
            Some((method, parameters)) => Ok(Self { method, parameters }),
            None => Err(MalformedProcessingStep(0)),
        }
    }
}
