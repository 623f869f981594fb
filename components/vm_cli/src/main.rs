//! `stackvm` entry point
//!
//! Parses the command line and runs the program. Errors are reported on
//! stderr; the process exits with the program's `EXIT` status, or 1 after
//! any other failure.

use clap::Parser;
use vm_cli::{Cli, Command, Runner};

fn main() {
    let cli = Cli::parse();
    let Command::Run(args) = cli.command;

    let result = Runner::load(&args).and_then(|runner| runner.run());
    match result {
        Ok(()) => {}
        Err(err) if err.is_exit() => std::process::exit(err.exit_code()),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(err.exit_code());
        }
    }
}
