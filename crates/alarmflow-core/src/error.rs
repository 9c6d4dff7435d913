// ── Core error types ──
//
// One error enum for the whole engine. Plugin capability traits
// (sources, jobs, parsers, OCR engines, stores) return it too, so a
// failure boundary never has to guess what it caught.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("OCR software directory not found: {path}")]
    OcrSoftwareNotFound { path: PathBuf },

    #[error("No alarm source could be started; refusing to run an engine with nothing to do")]
    NoAlarmSourcesStarted,

    #[error("Unknown {kind} plugin '{alias}'")]
    UnknownPlugin { kind: String, alias: String },

    // ── I/O errors ───────────────────────────────────────────────────
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not move {from} to {to} after {attempts} attempts: {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    // ── Pipeline errors ──────────────────────────────────────────────
    #[error("OCR failed for {image}: {message}")]
    Ocr { image: PathBuf, message: String },

    #[error("Could not convert {document} to an image: {message}")]
    Conversion { document: PathBuf, message: String },

    #[error("Parsing failed: {message}")]
    Parse { message: String },

    // ── Storage errors ───────────────────────────────────────────────
    #[error("Operation store error: {message}")]
    Store { message: String },

    #[error("Operation {id} not found")]
    OperationNotFound { id: u64 },

    // ── Plugin errors ────────────────────────────────────────────────
    #[error("Job '{job}' failed: {message}")]
    Job { job: String, message: String },

    #[error("Alarm source '{source_name}' failed: {message}")]
    AlarmSource { source_name: String, message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Engine is already started")]
    AlreadyStarted,

    #[error("Engine is not started")]
    NotStarted,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Attach a path to an `std::io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the engine configuration is unusable.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::OcrSoftwareNotFound { .. }
                | Self::NoAlarmSourcesStarted
                | Self::UnknownPlugin { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store {
            message: format!("serialization failed: {err}"),
        }
    }
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_owned()
}
