// ── Alarm events & job context ──
//
// An `AlarmEvent` travels from a source thread to the engine; the
// engine turns it into a `JobContext` for each job pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::operation::Operation;

/// Well-known keys of the event/context parameter map.
pub mod context_keys {
    /// Full path of the archived raw input (the claimed file).
    pub const ARCHIVED_FILE_PATH: &str = "ArchivedFilePath";
    /// Full path of the original image as it was found in the inbox.
    pub const IMAGE_PATH: &str = "ImagePath";
}

/// Free-form, channel-specific parameters.
pub type ContextParameters = BTreeMap<String, serde_json::Value>;

/// A parsed alarm raised by an alarm source.
#[derive(Debug, Clone)]
pub struct AlarmEvent {
    /// Alias of the source that produced the event.
    pub source: String,
    /// The parsed operation. `None` means an upstream failure slipped through.
    pub operation: Option<Operation>,
    pub parameters: ContextParameters,
}

impl AlarmEvent {
    pub fn new(source: impl Into<String>, operation: Operation) -> Self {
        Self {
            source: source.into(),
            operation: Some(operation),
            parameters: ContextParameters::new(),
        }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_owned(), value.into());
        self
    }
}

/// The two points in the pipeline where jobs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum JobPhase {
    /// Before persistence; jobs may enrich the operation.
    OnOperationSurfaced,
    /// After persistence; the operation carries its id.
    AfterOperationStored,
}

/// Per-pass context handed to every job.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Alias of the alarm source that produced the operation.
    pub source: String,
    pub parameters: ContextParameters,
    pub phase: JobPhase,
}

impl JobContext {
    pub fn new(source: impl Into<String>, parameters: ContextParameters, phase: JobPhase) -> Self {
        Self {
            source: source.into(),
            parameters,
            phase,
        }
    }

    /// Look up a string-valued parameter.
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(serde_json::Value::as_str)
    }
}
