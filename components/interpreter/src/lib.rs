//! Stack-machine interpreter for loaded bytecode programs
//!
//! This crate provides:
//! - The dispatch loop over a per-thread operand stack and call stack
//! - VM threads started by `ASYNC_MTHD_CALL`, with object monitors
//! - Memoized virtual dispatch shared by all threads
//! - Host traps for console, files, sockets, time and compression
//! - A seam for native code attached to methods
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, ProgramBuilder};
//! use interpreter::{Runtime, RuntimeConfig};
//!
//! let mut builder = ProgramBuilder::new();
//! let main = builder.add_class(
//!     ClassBuilder::new("Main").method(
//!         MethodBuilder::new("Main:,")
//!             .emit_operand(Opcode::LoadIntLit, 40)
//!             .emit_operand(Opcode::LoadIntLit, 2)
//!             .emit(Opcode::AddInt)
//!             .emit(Opcode::Rtrn),
//!     ),
//! );
//! builder.entry(main, 0);
//!
//! let runtime = Runtime::new(Arc::new(builder.build().unwrap()), RuntimeConfig::default()).unwrap();
//! assert_eq!(runtime.run().unwrap(), vec![42]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call_frame;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod dispatch_cache;
pub mod jit;
pub mod runtime;
pub mod strings;
pub mod threads;
pub mod traps;

// Re-export main types at crate root
pub use call_frame::{Frame, FramePool};
pub use config::{RuntimeConfig, StdioMode, CALL_STACK_SIZE};
pub use context::{ThreadContext, ThreadState};
pub use dispatch::Interpreter;
pub use dispatch_cache::DispatchCache;
pub use jit::{NativeCall, NativeExecutor};
pub use runtime::{Runtime, VERSION};
pub use threads::ThreadRegistry;
