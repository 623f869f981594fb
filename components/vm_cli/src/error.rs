//! Error types for the CLI

use bytecode_system::LoadError;
use core_types::{Fault, VmError};
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// The program file could not be loaded
    #[error("unable to load program: {0}")]
    Load(#[from] LoadError),

    /// The program halted with a fault
    #[error("{0}")]
    Vm(#[from] VmError),

    /// The runtime could not be set up
    #[error("unable to start runtime: {0}")]
    Setup(#[from] Fault),

    /// File I/O error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Vm(error) => error.exit_code(),
            _ => 1,
        }
    }

    /// Returns true for an `EXIT` requested by the program.
    pub fn is_exit(&self) -> bool {
        matches!(self, CliError::Vm(error) if error.fault.is_exit())
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
