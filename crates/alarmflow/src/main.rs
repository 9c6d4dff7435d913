mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::error::{CliError, exit_code};

fn main() {
    let cli = Cli::parse();

    let code = {
        // The guard flushes the log file; it must drop before `exit`.
        let _guard = init_tracing(cli.global.verbose, log_dir(&cli).as_deref());
        match run(cli) {
            Ok(()) => exit_code::SUCCESS,
            Err(err) => {
                let code = err.exit_code();
                eprintln!("{:?}", miette::Report::new(err));
                code
            }
        }
    };
    std::process::exit(code);
}

/// Only `run` writes a log file, into `[engine] log_dir` when set.
fn log_dir(cli: &Cli) -> Option<PathBuf> {
    if !matches!(cli.command, Command::Run(_)) {
        return None;
    }
    config::load(&cli.global).ok()?.engine.log_dir
}

fn init_tracing(verbosity: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "alarmflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    guard
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Run(args) => commands::run::handle(&args, &cli.global),
        Command::Operations(args) => commands::operations::handle(args, &cli.global),
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "alarmflow", &mut std::io::stdout());
            Ok(())
        }
    }
}
