//! repcc: command-line driver for the replicated concurrency-control simulator.
//!
//! Three modes:
//! - **Script mode**: `repcc script.txt` runs every line of the file
//! - **REPL mode**: `repcc` with a terminal on stdin shows a prompt
//! - **Pipe mode**: `cat script.txt | repcc` reads line by line from stdin
//!
//! Events go to stdout; errors and logs go to stderr.

mod commands;
mod format;
mod repl;
mod state;

use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::Path;
use std::process;

use repcc_core::Result;
use repcc_engine::{Coordinator, OutputFormat, SimConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use state::SessionState;

fn main() {
    let matches = build_cli().get_matches();

    init_logging(matches.get_one::<String>("log-level").map(String::as_str));

    let config = match load_config(matches.get_one::<String>("config").map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    };

    let mode = if matches.get_flag("json") {
        OutputFormat::Json
    } else {
        match config.output_format() {
            Ok(mode) => mode,
            Err(e) => {
                eprintln!("(error) {}", e);
                process::exit(1);
            }
        }
    };

    let mut state = SessionState::new(Coordinator::new(&config), mode);

    let exit_code = if let Some(input) = matches.get_one::<String>("input") {
        match File::open(input) {
            Ok(file) => repl::run_lines(BufReader::new(file), &mut state),
            Err(e) => {
                eprintln!("(error) cannot open '{}': {}", input, e);
                process::exit(1);
            }
        }
    } else if io::stdin().is_terminal() {
        repl::run_repl(&mut state);
        0
    } else {
        repl::run_lines(io::stdin().lock(), &mut state)
    };

    let metrics = state.coordinator().metrics();
    info!(
        target: "repcc::cli",
        clock = %state.coordinator().clock(),
        started = metrics.total_started,
        committed = metrics.total_committed,
        aborted = metrics.total_aborted,
        "Simulation finished"
    );
    process::exit(exit_code);
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(format!("repcc={level}"))
            .unwrap_or_else(|_| EnvFilter::new("repcc=warn")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repcc=warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .without_time()
        .init();
}

fn load_config(path: Option<&str>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let config = SimConfig::from_file(Path::new(path))?;
    debug!(
        target: "repcc::cli",
        path,
        sites = config.sites,
        variables = config.variables,
        "Config loaded"
    );
    Ok(config)
}
