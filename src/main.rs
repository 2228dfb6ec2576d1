//! Capaian - outcome attainment aggregation CLI
//!
//! Tracks how raw assessment scores roll up through course outcomes,
//! program outcomes, and graduate profile attributes, and recomputes the
//! weighted averages whenever a leaf input changes.

mod cli;
mod commands;

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use capaian_core::error::{CapaianError, ExitCode as CapaianExitCode};
use capaian_core::format::OutputFormat;
use capaian_core::logging;
use capaian_core::recompute::CancelFlag;
use cli::Cli;

fn main() -> ExitCode {
    let start = Instant::now();

    let argv_format_json = argv_requests_json();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // `--format` is a global flag, but clap may fail parsing before we
            // can inspect `Cli.format`. If the user requested JSON output,
            // emit a structured error envelope.
            if argv_format_json {
                let capaian_error = match err.kind() {
                    // Help and version are informational, not errors
                    clap::error::ErrorKind::DisplayHelp
                    | clap::error::ErrorKind::DisplayVersion => err.exit(),
                    _ => CapaianError::UsageError(err.to_string()),
                };

                eprintln!("{}", capaian_error.to_json());
                return ExitCode::from(capaian_error.exit_code() as u8);
            }

            err.exit();
        }
    };

    // Initialize structured logging
    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::debug!(elapsed = ?start.elapsed(), "parse_args");

    // Ctrl-C cancels an in-flight recompute at the next phase boundary;
    // once persisting has begun the transaction runs to completion.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        let _ = ctrlc::set_handler(move || cancel.cancel());
    }

    let result = commands::run(&cli, &cancel, start);

    match result {
        Ok(()) => ExitCode::from(CapaianExitCode::Success as u8),
        Err(e) => {
            let exit_code = e.exit_code();

            if cli.format == OutputFormat::Json {
                eprintln!("{}", e.to_json());
            } else if !cli.quiet {
                eprintln!("error: {}", e);
            }

            ExitCode::from(exit_code as u8)
        }
    }
}

fn argv_requests_json() -> bool {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--format" {
            if args.next().is_some_and(|v| v == "json") {
                return true;
            }
        } else if arg == "--format=json" {
            return true;
        }
    }
    false
}
