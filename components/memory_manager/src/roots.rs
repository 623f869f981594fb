//! Where the collector finds roots.
//!
//! Roots come from four places: class statics (heap blocks owned by the
//! manager), every registered VM thread, natively executing methods, and
//! debugger-held blocks. Threads are reached through the [`Mutator`] seam so
//! the collector never depends on the interpreter's frame layout.

use std::sync::Arc;

use core_types::Word;

use crate::block::Words;

/// One interpreted activation, as seen by the collector.
#[derive(Debug, Clone, Copy)]
pub struct FrameRoots<'a> {
    /// Class of the executing method
    pub class_id: usize,
    /// Executing method
    pub method_id: usize,
    /// Frame words; slot 0 is `self`, declarations start at slot 1
    pub locals: &'a [Word],
}

/// A parked thread's roots.
pub trait ThreadRoots: Sync {
    /// VM id of the thread.
    fn mutator_id(&self) -> u64;

    /// Live operand stack, scanned conservatively.
    fn operand_stack(&self) -> &[Word];

    /// Visits the current frame and every saved frame.
    fn for_each_frame(&self, visit: &mut dyn FnMut(FrameRoots<'_>));
}

/// A VM thread the collector can stop.
///
/// `park` blocks until the thread reaches an instruction boundary and keeps
/// it there for as long as the returned view lives.
pub trait Mutator: Send + Sync {
    /// VM id of the thread.
    fn id(&self) -> u64;

    /// Stops the thread and exposes its roots.
    fn park(&self) -> Box<dyn ThreadRoots + '_>;
}

/// Roots held outside any running thread.
#[derive(Debug, Clone, Default)]
pub struct DetachedRoots {
    /// Thread id reported to the collector
    pub id: u64,
    /// Words scanned as an operand stack
    pub stack: Vec<Word>,
}

impl DetachedRoots {
    /// No roots at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Roots consisting of `stack`.
    pub fn with_stack(stack: Vec<Word>) -> Self {
        Self { id: 0, stack }
    }
}

impl ThreadRoots for DetachedRoots {
    fn mutator_id(&self) -> u64 {
        self.id
    }

    fn operand_stack(&self) -> &[Word] {
        &self.stack
    }

    fn for_each_frame(&self, _visit: &mut dyn FnMut(FrameRoots<'_>)) {}
}

/// Locals of a method running as native code.
///
/// Native code writes its frame into `locals`; the collector scans the
/// first `size` words by the method's declarations.
#[derive(Debug, Clone)]
pub struct JitRoot {
    /// Class of the method
    pub class_id: usize,
    /// The method
    pub method_id: usize,
    /// Receiver of the call
    pub self_ref: Word,
    /// Frame words shared with the native code
    pub locals: Arc<Words>,
    /// Words currently valid in `locals`
    pub size: usize,
}

impl JitRoot {
    /// Root for an activation of `class_id`/`method_id` on `self_ref`.
    pub fn new(class_id: usize, method_id: usize, self_ref: Word, locals: Arc<Words>) -> Self {
        let size = locals.len();
        Self {
            class_id,
            method_id,
            self_ref,
            locals,
            size,
        }
    }
}
