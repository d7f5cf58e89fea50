//! Entry point of the autostop control CLI.
//!
//! Parses the command line, loads configuration and credentials and runs the
//! requested operation. Errors are reported once, in string format, and turn
//! into a non-zero exit code.
use autostop_control::cli::Cli;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match Cli::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("autostop-control: {err}");
            ExitCode::FAILURE
        }
    }
}
