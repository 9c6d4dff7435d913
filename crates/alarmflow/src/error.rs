//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use alarmflow_config::ConfigError;
use alarmflow_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const ENGINE_START: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Engine ───────────────────────────────────────────────────────

    #[error("The alarm engine could not be started: {reason}")]
    #[diagnostic(
        code(alarmflow::engine_start),
        help(
            "At least one alarm source must initialize.\n\
             Check the [fax] directories and ocr_path, then run: alarmflow config check"
        )
    )]
    EngineStart { reason: String },

    #[error("Engine error: {message}")]
    #[diagnostic(code(alarmflow::engine))]
    Engine { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(alarmflow::not_found),
        help("Run: alarmflow {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(alarmflow::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration is not usable: {message}")]
    #[diagnostic(
        code(alarmflow::invalid_config),
        help("Fix the config file, then run: alarmflow config check")
    )]
    InvalidConfig { message: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(alarmflow::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(alarmflow::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(alarmflow::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EngineStart { .. } => exit_code::ENGINE_START,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::InvalidConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Wrap any failure of `Engine::start` (or a one-shot pass).
    pub fn engine_start(err: &CoreError) -> Self {
        Self::EngineStart {
            reason: err.to_string(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OperationNotFound { id } => CliError::NotFound {
                resource_type: "operation".into(),
                identifier: id.to_string(),
                list_command: "operations list".into(),
            },

            CoreError::NoAlarmSourcesStarted => CliError::engine_start(&err),

            err if err.is_config() => CliError::InvalidConfig {
                message: err.to_string(),
            },

            other => CliError::Engine {
                message: other.to_string(),
            },
        }
    }
}
