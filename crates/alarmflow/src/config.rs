//! CLI configuration: thin wrapper around `alarmflow_config`.
//!
//! Adds `--config` resolution on top of the shared loader.

use std::path::PathBuf;

use alarmflow_core::EngineConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use alarmflow_config::{Config, load_config_from, save_config};

/// The config file in effect: `--config` / `ALARMFLOW_CONFIG`, else the
/// platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(alarmflow_config::config_path)
}

/// Load the layered configuration for this invocation.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_path(global))?)
}

/// Load and validate, yielding the engine configuration.
pub fn load_engine_config(global: &GlobalOpts) -> Result<EngineConfig, CliError> {
    Ok(load(global)?.to_engine_config()?)
}
