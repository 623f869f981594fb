//! Memory Manager - heap and garbage collector for the stack VM
//!
//! This component provides:
//! - Handle-addressed heap blocks for objects, arrays, statics and function values
//! - Size-classed buffer pools (16 B to 2 MiB) that recycle swept blocks
//! - A stop-the-world mark-and-sweep collector that marks each root category
//!   on its own scoped thread
//! - Adaptive collection threshold
//! - Per-object reentrant monitors for user-level locking
//!
//! Threads take part through the [`Mutator`] trait: the collector parks each
//! registered thread and reads its operand stack and frames through
//! [`ThreadRoots`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod collector;
pub mod config;
pub mod heap;
mod mark;
pub mod monitor;
pub mod pool;
pub mod roots;

// Re-export main types
pub use block::{ArrayKind, BlockKind, HeapBlock, Words, ARRAY_HEADER_WORDS, HEADER_WORDS};
pub use collector::MemoryManager;
pub use config::{CycleReport, GcConfig, GcStats, DEFAULT_THRESHOLD};
pub use heap::{Allocation, Heap, HANDLE_SHIFT};
pub use monitor::Monitor;
pub use pool::{size_class_for, SIZE_CLASSES};
pub use roots::{DetachedRoots, FrameRoots, JitRoot, Mutator, ThreadRoots};
