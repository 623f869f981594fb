//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use interpreter::StdioMode;

/// Stack-machine bytecode runner
#[derive(Debug, Parser)]
#[command(name = "stackvm", version, about)]
pub struct Cli {
    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a program file and run its entry method
    Run(RunArgs),
}

/// Arguments of `stackvm run`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Program file to execute
    pub file: PathBuf,

    /// Character encoding of stdout and stderr (binary, utf8, utf16)
    #[arg(long, default_value_t = StdioMode::Utf8, value_parser = parse_stdio_mode)]
    pub stdio_mode: StdioMode,

    /// Initial collection threshold: N, Nk, Nm or Ng bytes
    #[arg(long, value_parser = parse_size)]
    pub gc_threshold: Option<usize>,

    /// Print one line per collection cycle to stderr
    #[arg(long)]
    pub gc_trace: bool,

    /// Print collector statistics to stderr on exit
    #[arg(long)]
    pub gc_stats: bool,

    /// Arguments passed to the program's entry method
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

fn parse_stdio_mode(value: &str) -> Result<StdioMode, String> {
    value.parse()
}

/// Parses a byte count with an optional `k`, `m` or `g` suffix (binary
/// multiples, any case).
///
/// # Example
///
/// ```
/// use vm_cli::parse_size;
///
/// assert_eq!(parse_size("512"), Ok(512));
/// assert_eq!(parse_size("4K"), Ok(4096));
/// assert!(parse_size("lots").is_err());
/// ```
pub fn parse_size(value: &str) -> Result<usize, String> {
    let value = value.trim();
    let (digits, shift) = match value.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('k') => (&value[..value.len() - 1], 10),
        Some('m') => (&value[..value.len() - 1], 20),
        Some('g') => (&value[..value.len() - 1], 30),
        _ => (value, 0),
    };
    let count: usize = digits
        .parse()
        .map_err(|_| format!("invalid size '{}'", value))?;
    count
        .checked_mul(1usize << shift)
        .ok_or_else(|| format!("size '{}' is too large", value))
}
