//! Program model and binary format for the stack VM
//!
//! This crate provides the instruction set, trap ids, and the immutable
//! program model the interpreter executes.
//!
//! # Features
//!
//! - Stable opcode, trap, parameter-type and memory-context numbering
//! - Classes with typed static and instance declarations, single inheritance
//!   plus interfaces
//! - Methods with label tables, write-once jump caches and lazily attached
//!   native code
//! - Binary serialization (`SVMP` header + bincode body)
//! - Builders for assembling programs in code
//!
//! # Example
//!
//! ```
//! use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, Program, ProgramBuilder};
//!
//! let mut builder = ProgramBuilder::new();
//! let cls = builder.add_class(
//!     ClassBuilder::new("Hello").method(MethodBuilder::new("Main:,").emit(Opcode::Rtrn)),
//! );
//! builder.entry(cls, 0);
//! let program = builder.build().unwrap();
//!
//! // Serialize
//! let bytes = program.to_bytes().unwrap();
//! let restored = Program::from_bytes(&bytes).unwrap();
//! assert_eq!(restored.class(cls).unwrap().name(), "Hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

#[macro_use]
mod macros;

pub mod builder;
pub mod instruction;
pub mod loader;
pub mod opcode;
pub mod program;
pub mod trap;

// Re-export main types at crate root
pub use builder::{ClassBuilder, MethodBuilder, ProgramBuilder};
pub use instruction::Instruction;
pub use loader::{LoadError, FORMAT_VERSION, MAGIC};
pub use opcode::{declaration_layout, declaration_words, MemoryContext, Opcode, ParamType};
pub use program::{Class, Method, MethodRef, NativeCode, Program, STRING_CLASS_NAME};
pub use trap::TrapId;
