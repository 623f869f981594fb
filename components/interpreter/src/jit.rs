//! Native execution seam
//!
//! A [`NativeExecutor`] compiles methods to native code and runs them. The
//! interpreter asks for compilation once per method, under the method's
//! compile lock, and runs the result whenever a call instruction is flagged
//! native. While native code runs, its frame is registered with the
//! collector as a JIT root.

use std::sync::Arc;

use bytecode_system::{Method, NativeCode};
use core_types::{Fault, Word};
use memory_manager::Words;

use crate::context::ThreadState;
use crate::runtime::Runtime;

/// Compiles and runs methods outside the dispatch loop.
pub trait NativeExecutor: Send + Sync {
    /// Compiles `method`; `None` leaves it interpreted for good.
    fn compile(&self, method: &Method) -> Option<NativeCode>;

    /// Runs previously compiled code for one activation.
    fn execute(&self, code: &NativeCode, call: &mut NativeCall<'_>) -> Result<(), Fault>;
}

/// One native activation.
pub struct NativeCall<'a> {
    /// The runtime the call belongs to
    pub runtime: &'a Arc<Runtime>,
    /// The method being run
    pub method: &'a Method,
    /// Receiver of the call
    pub self_ref: Word,
    /// Frame words shared with the collector; slot 0 is `self`
    pub locals: &'a Arc<Words>,
    /// Operand stack and frames of the calling thread
    pub state: &'a mut ThreadState,
}

impl NativeCall<'_> {
    /// Pops an integer from the caller's operand stack.
    pub fn pop_int(&mut self) -> Result<Word, Fault> {
        self.state.pop_int()
    }

    /// Pushes an integer onto the caller's operand stack.
    pub fn push_int(&mut self, value: Word) {
        self.state.push_int(value)
    }

    /// Reads frame slot `slot`.
    pub fn local(&self, slot: usize) -> Result<Word, Fault> {
        self.locals.load(slot)
    }

    /// Writes frame slot `slot`.
    pub fn set_local(&self, slot: usize, value: Word) -> Result<(), Fault> {
        self.locals.store(slot, value)
    }
}

/// Returns the method's native code, compiling it on first use.
///
/// Only one thread compiles a given method; others keep interpreting until
/// the outcome is attached.
pub fn native_code<'m>(executor: &dyn NativeExecutor, method: &'m Method) -> Option<&'m NativeCode> {
    if !method.compile_attempted() {
        if let Some(_guard) = method.try_compile_lock() {
            if !method.compile_attempted() {
                method.attach_native(executor.compile(method));
            }
        }
    }
    method.native_code()
}

/// Runs `code` as one activation of `method` on `self_ref`.
pub fn run_native(
    runtime: &Arc<Runtime>,
    executor: &dyn NativeExecutor,
    code: &NativeCode,
    method: &Method,
    self_ref: Word,
    state: &mut ThreadState,
) -> Result<(), Fault> {
    let locals = Arc::new(Words::new(method.frame_words()));
    locals.store(0, self_ref)?;
    let memory = runtime.memory();
    memory.register_jit_root(
        method.class_id(),
        method.id(),
        self_ref,
        locals.clone(),
        method.frame_words(),
    );
    let result = {
        let mut call = NativeCall {
            runtime,
            method,
            self_ref,
            locals: &locals,
            state,
        };
        executor.execute(code, &mut call)
    };
    memory.unregister_jit_root(&locals);
    result
}
