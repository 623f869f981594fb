//! Runtime configuration

use std::fmt;
use std::str::FromStr;

use memory_manager::GcConfig;

/// Maximum depth of saved frames per thread.
pub const CALL_STACK_SIZE: usize = 1024;

/// How character output is encoded on stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Low byte of each character
    Binary,
    /// UTF-8
    #[default]
    Utf8,
    /// UTF-16 little-endian
    Utf16,
}

impl StdioMode {
    /// Encodes `text` for output in this mode.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            StdioMode::Binary => text.chars().map(|c| c as u32 as u8).collect(),
            StdioMode::Utf8 => text.as_bytes().to_vec(),
            StdioMode::Utf16 => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }
}

impl FromStr for StdioMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "binary" => Ok(StdioMode::Binary),
            "utf8" | "utf-8" => Ok(StdioMode::Utf8),
            "utf16" | "utf-16" => Ok(StdioMode::Utf16),
            other => Err(format!("unknown stdio mode '{}'", other)),
        }
    }
}

impl fmt::Display for StdioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StdioMode::Binary => "binary",
            StdioMode::Utf8 => "utf8",
            StdioMode::Utf16 => "utf16",
        };
        f.write_str(name)
    }
}

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Collector tuning
    pub gc: GcConfig,
    /// Character output encoding
    pub stdio: StdioMode,
}

impl RuntimeConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial collection threshold in bytes.
    pub fn with_gc_threshold(mut self, bytes: usize) -> Self {
        self.gc = self.gc.with_threshold(bytes);
        self
    }

    /// Sets the stdio encoding.
    pub fn with_stdio_mode(mut self, mode: StdioMode) -> Self {
        self.stdio = mode;
        self
    }

    /// Enables the per-cycle collector trace on stderr.
    pub fn with_gc_trace(mut self, trace: bool) -> Self {
        self.gc = self.gc.with_trace(trace);
        self
    }
}
