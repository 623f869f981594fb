//! Per-thread execution state
//!
//! Every VM thread owns a [`ThreadContext`]. Its [`ThreadState`] (operand
//! stack, current frame, saved frames, held monitors) sits behind a mutex the
//! thread keeps locked while it runs. The collector parks the thread by
//! taking that mutex, which the thread yields at every instruction boundary
//! and around blocking operations.

use std::sync::Arc;

use arrayvec::ArrayVec;
use parking_lot::{Mutex, MutexGuard};

use bytecode_system::Program;
use core_types::{float_to_words, words_to_float, Fault, StackFrame, Word, FLOAT_WORDS};
use memory_manager::{FrameRoots, Monitor, Mutator, ThreadRoots};

use crate::call_frame::Frame;
use crate::config::CALL_STACK_SIZE;

/// Operand stack, frames and held monitors of one VM thread.
#[derive(Debug)]
pub struct ThreadState {
    /// VM thread id
    pub id: u64,
    /// Operand stack
    pub stack: Vec<Word>,
    /// Saved caller frames, outermost first
    pub calls: ArrayVec<Frame, CALL_STACK_SIZE>,
    /// Executing frame
    pub frame: Option<Frame>,
    /// Monitors entered by `CRITICAL_START` and not yet left
    pub held: Vec<Arc<Monitor>>,
}

impl ThreadState {
    /// Creates an idle thread state.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            stack: Vec::with_capacity(64),
            calls: ArrayVec::new(),
            frame: None,
            held: Vec::new(),
        }
    }

    /// Pushes an integer word.
    pub fn push_int(&mut self, value: Word) {
        self.stack.push(value);
    }

    /// Pops an integer word.
    pub fn pop_int(&mut self) -> Result<Word, Fault> {
        self.stack.pop().ok_or(Fault::StackUnderflow)
    }

    /// Reads the top word without popping it.
    pub fn top_int(&self) -> Result<Word, Fault> {
        self.stack.last().copied().ok_or(Fault::StackUnderflow)
    }

    /// Pushes a float as `FLOAT_WORDS` words.
    pub fn push_float(&mut self, value: f64) {
        self.stack.extend_from_slice(&float_to_words(value));
    }

    /// Pops a float.
    pub fn pop_float(&mut self) -> Result<f64, Fault> {
        let start = self
            .stack
            .len()
            .checked_sub(FLOAT_WORDS)
            .ok_or(Fault::StackUnderflow)?;
        let value = words_to_float(&self.stack[start..]);
        self.stack.truncate(start);
        Ok(value)
    }

    /// Reads the top float without popping it.
    pub fn top_float(&self) -> Result<f64, Fault> {
        let start = self
            .stack
            .len()
            .checked_sub(FLOAT_WORDS)
            .ok_or(Fault::StackUnderflow)?;
        Ok(words_to_float(&self.stack[start..]))
    }

    /// Exchanges the two top words.
    pub fn swap_int(&mut self) -> Result<(), Fault> {
        let len = self.stack.len();
        if len < 2 {
            return Err(Fault::StackUnderflow);
        }
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    /// The executing frame.
    pub fn frame(&self) -> Result<&Frame, Fault> {
        self.frame.as_ref().ok_or(Fault::StackUnderflow)
    }

    /// The executing frame, mutably.
    pub fn frame_mut(&mut self) -> Result<&mut Frame, Fault> {
        self.frame.as_mut().ok_or(Fault::StackUnderflow)
    }

    /// Saves `frame` as a caller.
    ///
    /// # Returns
    ///
    /// `Fault::StackOverflow` once `CALL_STACK_SIZE` frames are saved.
    pub fn push_call(&mut self, frame: Frame) -> Result<(), Fault> {
        self.calls.try_push(frame).map_err(|_| Fault::StackOverflow)
    }

    /// Restores the most recent caller.
    pub fn pop_call(&mut self) -> Option<Frame> {
        self.calls.pop()
    }

    /// Frame names from the executing method outward.
    pub fn trace(&self, program: &Program) -> Vec<StackFrame> {
        let depth = self.calls.len();
        let name = |frame: &Frame| {
            program
                .method(frame.class_id, frame.method_id)
                .map_or_else(|| "<unknown>".to_string(), |m| m.name().to_string())
        };
        let mut trace = Vec::with_capacity(depth + 1);
        if let Some(frame) = &self.frame {
            trace.push(StackFrame::new(name(frame), depth));
        }
        for (position, frame) in self.calls.iter().enumerate().rev() {
            trace.push(StackFrame::new(name(frame), position));
        }
        trace
    }

    /// Leaves every monitor this thread still holds.
    pub fn release_monitors(&mut self) {
        for monitor in self.held.drain(..) {
            monitor.exit(self.id);
        }
    }
}

impl ThreadRoots for ThreadState {
    fn mutator_id(&self) -> u64 {
        self.id
    }

    fn operand_stack(&self) -> &[Word] {
        &self.stack
    }

    fn for_each_frame(&self, visit: &mut dyn FnMut(FrameRoots<'_>)) {
        if let Some(frame) = &self.frame {
            visit(frame.roots());
        }
        for frame in &self.calls {
            visit(frame.roots());
        }
    }
}

/// A VM thread as the runtime and the collector see it.
#[derive(Debug)]
pub struct ThreadContext {
    id: u64,
    state: Mutex<ThreadState>,
}

impl ThreadContext {
    /// Creates the context for thread `id`.
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(ThreadState::new(id)),
        })
    }

    /// VM thread id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Locks the thread state; held for as long as the thread runs.
    pub fn lock(&self) -> MutexGuard<'_, ThreadState> {
        self.state.lock()
    }
}

/// A parked thread, kept at its safepoint while the guard lives.
struct ParkedThread<'a> {
    state: MutexGuard<'a, ThreadState>,
}

impl ThreadRoots for ParkedThread<'_> {
    fn mutator_id(&self) -> u64 {
        self.state.id
    }

    fn operand_stack(&self) -> &[Word] {
        &self.state.stack
    }

    fn for_each_frame(&self, visit: &mut dyn FnMut(FrameRoots<'_>)) {
        self.state.for_each_frame(visit)
    }
}

impl Mutator for ThreadContext {
    fn id(&self) -> u64 {
        self.id
    }

    fn park(&self) -> Box<dyn ThreadRoots + '_> {
        Box::new(ParkedThread {
            state: self.state.lock(),
        })
    }
}
