//! Program binary format.
//!
//! Layout: the magic bytes `SVMP`, one format-version byte, then the
//! bincode-encoded program model (class table, string pools, methods,
//! instructions with their opcode numbers and operands). Decoding always ends
//! with [`Program::link`], so a loaded program is ready to run.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::program::Program;

/// Magic bytes at the start of every program file.
pub const MAGIC: &[u8; 4] = b"SVMP";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1;

/// Errors raised while reading or validating a program.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File could not be read or written
    #[error("unable to access program file: {0}")]
    Io(#[from] io::Error),
    /// The stream does not start with the magic bytes
    #[error("invalid magic number: not a program file")]
    BadMagic,
    /// The format version is not understood
    #[error("unsupported program format version: {0}")]
    UnsupportedVersion(u8),
    /// The stream ended early
    #[error("program file is truncated")]
    Truncated,
    /// The stream could not be decoded
    #[error("program file is corrupt: {0}")]
    Corrupt(String),
    /// A class id is out of range or out of order
    #[error("invalid class reference: {0}")]
    DanglingClass(usize),
    /// A method id is out of range or out of order
    #[error("invalid method reference: class={class}, method={method}")]
    DanglingMethod {
        /// Class id
        class: usize,
        /// Method id
        method: usize,
    },
    /// A class is its own ancestor
    #[error("class hierarchy cycle through class {0}")]
    CyclicHierarchy(usize),
    /// A label is defined twice in one method
    #[error("duplicate label {label} in '{method}'")]
    DuplicateLabel {
        /// Qualified method name
        method: String,
        /// Label id
        label: i64,
    },
}

impl From<bincode::Error> for LoadError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
                LoadError::Truncated
            }
            other => LoadError::Corrupt(other.to_string()),
        }
    }
}

impl Program {
    /// Serialize program to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>, LoadError> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);

        // Magic number
        bytes.extend_from_slice(MAGIC);

        // Version
        bytes.push(FORMAT_VERSION);

        bincode::serialize_into(&mut bytes, self)?;
        Ok(bytes)
    }

    /// Deserialize and link a program from binary format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() < MAGIC.len() {
            return if MAGIC.starts_with(bytes) {
                Err(LoadError::Truncated)
            } else {
                Err(LoadError::BadMagic)
            };
        }

        // Check magic number
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(LoadError::BadMagic);
        }

        // Check version
        let version = *bytes.get(MAGIC.len()).ok_or(LoadError::Truncated)?;
        if version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion(version));
        }

        let mut program: Program = bincode::deserialize(&bytes[HEADER_LEN..])?;
        program.link()?;
        Ok(program)
    }

    /// Read and link a program file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Write the program to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}
