//! Command line entry point of the fieldsync replicator.
//!
//! Loads configuration from `configuration/` and `FIELDSYNC_` environment variables, sets up
//! logging and runs one subcommand on a multi-thread tokio runtime.

use std::process::ExitCode;

use clap::Parser;
use fieldsync_telemetry::tracing::{FileLogging, LogFormat, TracingOptions, init_tracing};

use crate::cli::{Cli, LogFormatArg};
use crate::config::load_fieldsync_config;
use crate::core::run_command;
use crate::error::{ReplicatorError, ReplicatorResult};

mod cli;
mod config;
mod core;
mod error;
mod output;
mod stores;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ReplicatorResult<ExitCode> {
    let config = load_fieldsync_config()?;

    let _log_flusher = init_tracing(TracingOptions {
        format: match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        },
        file: cli.log_dir.map(|dir| FileLogging {
            dir,
            ..Default::default()
        }),
        default_directive: None,
    })
    .map_err(ReplicatorError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_command(config, cli.command, cli.json))
}
