//! Launcher library for the `stackvm` binary
//!
//! Parses arguments, loads a program file and runs it on an
//! [`interpreter::Runtime`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod runner;

pub use cli::{parse_size, Cli, Command, RunArgs};
pub use error::{CliError, CliResult};
pub use runner::{runtime_config, Runner};
