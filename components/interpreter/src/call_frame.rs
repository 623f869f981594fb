//! Call frames and the shared frame pool

use bytecode_system::Method;
use core_types::{Fault, Word, NIL};
use memory_manager::FrameRoots;
use parking_lot::Mutex;

use crate::config::CALL_STACK_SIZE;

/// One method activation.
///
/// `locals[0]` holds `self`; declared locals start at slot 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Class of the executing method
    pub class_id: usize,
    /// Executing method
    pub method_id: usize,
    /// Frame words
    pub locals: Vec<Word>,
    /// Instruction to resume at
    pub ip: usize,
}

impl Frame {
    /// Receiver of the activation.
    pub fn self_ref(&self) -> Word {
        self.locals.first().copied().unwrap_or(NIL)
    }

    /// Reads frame slot `slot`.
    pub fn load(&self, slot: usize) -> Result<Word, Fault> {
        self.locals.get(slot).copied().ok_or(Fault::MemoryAccess {
            index: slot as i64,
            size: self.locals.len() as i64,
        })
    }

    /// Writes frame slot `slot`.
    pub fn store(&mut self, slot: usize, value: Word) -> Result<(), Fault> {
        let size = self.locals.len() as i64;
        match self.locals.get_mut(slot) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Fault::MemoryAccess {
                index: slot as i64,
                size,
            }),
        }
    }

    /// The frame as the collector sees it.
    pub fn roots(&self) -> FrameRoots<'_> {
        FrameRoots {
            class_id: self.class_id,
            method_id: self.method_id,
            locals: &self.locals,
        }
    }
}

/// Recycled local-word buffers shared by all threads.
#[derive(Debug, Default)]
pub struct FramePool {
    free: Mutex<Vec<Vec<Word>>>,
}

impl FramePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a zeroed frame for `method` with `self_ref` in slot 0.
    pub fn acquire(&self, method: &Method, self_ref: Word) -> Frame {
        let mut locals = self.free.lock().pop().unwrap_or_default();
        locals.clear();
        locals.resize(method.frame_words(), NIL);
        locals[0] = self_ref;
        Frame {
            class_id: method.class_id(),
            method_id: method.id(),
            locals,
            ip: 0,
        }
    }

    /// Returns a frame's buffer to the pool.
    pub fn release(&self, frame: Frame) {
        let mut free = self.free.lock();
        if free.len() < CALL_STACK_SIZE {
            free.push(frame.locals);
        }
    }

    /// Buffers waiting for reuse.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}
