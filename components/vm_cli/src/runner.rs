//! Program loading and execution for `stackvm run`

use std::sync::Arc;

use bytecode_system::Program;
use interpreter::{Runtime, RuntimeConfig};
use memory_manager::GcStats;

use crate::cli::RunArgs;
use crate::error::CliResult;

/// Runtime configuration selected by the command line.
pub fn runtime_config(args: &RunArgs) -> RuntimeConfig {
    let config = RuntimeConfig::new()
        .with_stdio_mode(args.stdio_mode)
        .with_gc_trace(args.gc_trace);
    match args.gc_threshold {
        Some(bytes) => config.with_gc_threshold(bytes),
        None => config,
    }
}

/// A loaded program ready to run.
#[derive(Debug)]
pub struct Runner {
    runtime: Arc<Runtime>,
    args: Vec<String>,
    gc_stats: bool,
}

impl Runner {
    /// Loads and links the program file named in `args`.
    ///
    /// # Errors
    ///
    /// `CliError::Load` for unreadable or malformed files, and
    /// `CliError::Setup` if class statics cannot be allocated.
    pub fn load(args: &RunArgs) -> CliResult<Self> {
        let program = Program::load(&args.file)?;
        let runtime = Runtime::new(Arc::new(program), runtime_config(args))?;
        Ok(Self {
            runtime,
            args: args.args.clone(),
            gc_stats: args.gc_stats,
        })
    }

    /// The runtime the program runs on.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Runs the initialization and entry methods, then waits for threads the
    /// program started.
    pub fn run(&self) -> CliResult<()> {
        let result = self.runtime.run_with_args(&self.args);
        self.runtime.flush_output();
        if self.gc_stats {
            eprintln!("{}", stats_report(&self.runtime.memory().stats()));
        }
        result?;
        Ok(())
    }
}

/// One-line summary printed by `--gc-stats`.
pub fn stats_report(stats: &GcStats) -> String {
    format!(
        "gc: cycles={} skipped={} allocations={} freed={} live={} threshold={} pool_hits={}",
        stats.cycles,
        stats.skipped,
        stats.allocations,
        stats.bytes_freed,
        stats.live_bytes,
        stats.threshold,
        stats.pool_hits
    )
}
