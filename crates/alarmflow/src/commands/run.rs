//! `alarmflow run`: host the engine in the foreground.

use tracing::info;

use alarmflow_core::{Engine, EngineState, PluginRegistry};

use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;

pub fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let engine_config = config::load_engine_config(global)?;
    let engine = Engine::new(engine_config, PluginRegistry::with_defaults());

    if args.once {
        let stored = engine.poll_once().map_err(|e| CliError::engine_start(&e))?;
        info!(stored, "single pass finished");
        if !global.quiet {
            eprintln!("Stored {stored} operation(s)");
        }
        return Ok(());
    }

    engine.start().map_err(|e| CliError::engine_start(&e))?;
    if !global.quiet {
        if let EngineState::Running { sources } = &*engine.state().borrow() {
            eprintln!("alarmflow running ({}), press Ctrl-C to stop", sources.join(", "));
        }
    }

    let waited = wait_for_interrupt();
    engine.stop()?;
    waited
}

/// Block until Ctrl-C.
fn wait_for_interrupt() -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;
    info!("interrupt received, stopping");
    Ok(())
}
