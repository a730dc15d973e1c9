//! Clap argument definition.

use clap::{Arg, ArgAction, Command};

/// Build the `repcc` argument parser.
pub fn build_cli() -> Command {
    Command::new("repcc")
        .about("Replicated concurrency-control simulator")
        .long_about(
            "Runs a script of begin/beginRO/R/W/end/fail/recover/dump commands \
             against a simulated cluster of sites. Without INPUT, commands are \
             read from stdin (interactively when it is a terminal) until `exit`.",
        )
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("Command script to run (default: stdin)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Simulator config file (repcc.toml)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print each event as a JSON object")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level for the simulator (default: warn, or RUST_LOG)"),
        )
}
