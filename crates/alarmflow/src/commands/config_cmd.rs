//! Config subcommand handlers.

use std::fmt::Write as _;

use alarmflow_core::{EngineConfig, PluginRegistry};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Human-readable summary of the resolved configuration.
fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# could not render config: {e}\n"))
}

/// Every alias in `engine` that the built-in registry does not know.
fn unknown_aliases(engine: &EngineConfig, registry: &PluginRegistry) -> Vec<String> {
    let mut unknown = Vec::new();
    let mut check = |kind: &str, alias: &str, known: bool| {
        if !known {
            unknown.push(format!("{kind} '{alias}'"));
        }
    };

    for alias in &engine.alarm_sources {
        check("alarm source", alias, registry.alarm_sources.contains(alias));
    }
    for alias in &engine.jobs {
        check("job", alias, registry.jobs.contains(alias));
    }
    check(
        "operation store",
        &engine.operation_store,
        registry.operation_stores.contains(&engine.operation_store),
    );
    if engine.alarm_sources.iter().any(|a| a == "fax") {
        check("parser", &engine.fax.parser, registry.parsers.contains(&engine.fax.parser));
        check("OCR engine", &engine.fax.ocr, registry.ocr_engines.contains(&engine.fax.ocr));
        check(
            "PDF converter",
            &engine.fax.pdf_converter,
            registry.pdf_converters.contains(&engine.fax.pdf_converter),
        );
    }
    unknown
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        // ── Init: write every default ───────────────────────────────
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Configuration written to {}", path.display());
                eprintln!("  Check it: alarmflow config check");
            }
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                path.display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── Check ───────────────────────────────────────────────────
        ConfigCommand::Check => {
            let engine = config::load_engine_config(global)?;
            let unknown = unknown_aliases(&engine, &PluginRegistry::with_defaults());
            if !unknown.is_empty() {
                return Err(CliError::InvalidConfig {
                    message: format!("unknown plugin aliases: {}", unknown.join(", ")),
                });
            }

            if !global.quiet {
                let mut out = String::new();
                let _ = writeln!(out, "Configuration OK ({})", path.display());
                let _ = writeln!(out, "  sources: {}", engine.alarm_sources.join(", "));
                let _ = writeln!(out, "  jobs:    {}", engine.jobs.join(", "));
                let _ = write!(out, "  store:   {}", engine.operation_store);
                output::print_output(&out, false);
            }
            Ok(())
        }
    }
}
