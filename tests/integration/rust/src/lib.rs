//! Integration test suite for the stack VM
//!
//! Scenarios that cross component boundaries: programs assembled with the
//! bytecode builder, run on the interpreter, collected by the memory manager
//! and driven through the CLI runner.

use std::sync::Arc;

use bytecode_system::{ClassBuilder, LoadError, Program, ProgramBuilder};
use interpreter::{Runtime, RuntimeConfig};

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
    pub use vm_cli;
}

/// Links `classes` into a program whose entry point is method 0 of class 0.
pub fn program(classes: Vec<ClassBuilder>) -> Result<Program, LoadError> {
    let mut builder = ProgramBuilder::new();
    for class in classes {
        builder.add_class(class);
    }
    builder.entry(0, 0);
    builder.build()
}

/// A runtime over [`program`].
pub fn runtime(classes: Vec<ClassBuilder>, config: RuntimeConfig) -> Arc<Runtime> {
    let program = program(classes).unwrap_or_else(|err| panic!("program does not link: {err}"));
    Runtime::new(Arc::new(program), config)
        .unwrap_or_else(|fault| panic!("runtime setup failed: {fault}"))
}
