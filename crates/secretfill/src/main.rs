//! secretfill binary
//!
//! Loads configuration, initializes tracing, then runs the pipeline on a
//! current-thread runtime and exits 0 or 1.

#![allow(clippy::print_stderr)]

use clap::Parser;
use secretfill::cli::{Cli, CliError, EXIT_FAILURE, EXIT_OK, render_error};
use secretfill::config::{Config, PartialConfig};
use secretfill::pipeline;
use secretfill::tracing::{TracingFormat, init_tracing, run_id};
use std::path::Path;
use ::tracing::Instrument;

fn main() {
    // Tracing may be unusable during a panic; write straight to stderr.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();
    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let flags = PartialConfig::from(cli);
    let file = PartialConfig::load_file(cli.config.as_deref(), Path::new("."));

    let merged = match &file {
        Ok(Some((_, layer))) => flags.or(layer.clone()),
        _ => flags,
    };

    let log = merged.log_settings();
    let json_mode = log.format == TracingFormat::Json;
    if let Err(e) = init_tracing(log.tracing_config()) {
        eprintln!("Failed to initialize tracing: {e}");
    }
    if let Some(raw) = &log.unrecognized_level {
        ::tracing::warn!(level = %raw, "Unknown log level, using info");
    }

    match file {
        Ok(Some((path, _))) => {
            ::tracing::info!(path = %path.display(), "Using config file");
        }
        Ok(None) => {}
        Err(err) => return fail(&err, json_mode),
    }

    let config = match Config::from_partial(merged) {
        Ok(config) => config,
        Err(err) => return fail(&err, json_mode),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            return fail(
                &CliError::config(format!("Failed to create tokio runtime: {e}")),
                json_mode,
            );
        }
    };

    let span = ::tracing::info_span!(
        "secretfill",
        run_id = %run_id(),
        criterion = %config.criterion,
        region = %config.region,
    );
    match runtime.block_on(pipeline::run_aws(&config).instrument(span)) {
        Ok(_) => EXIT_OK,
        Err(err) => fail(&err, json_mode),
    }
}

fn fail(err: &CliError, json_mode: bool) -> i32 {
    render_error(err, json_mode);
    EXIT_FAILURE
}
