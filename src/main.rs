//! Binary entry point for collegue.
//!
//! Drives the analysis tools from the command line; JSON results go to
//! stdout, logs to stderr.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// CLI output goes through stdout/stderr directly.
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]

use clap::Parser;
use collegue::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
