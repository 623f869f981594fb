//! Runtime fault types.
//!
//! A [`Fault`] is detected inline by the instruction that hits it. Every
//! fault is fatal for the thread that raised it; [`VmError`] carries the
//! frame-name trace collected while unwinding so the process can report it.

use std::fmt;

use thiserror::Error;

use crate::StackFrame;

/// The kind of fault that halted execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// A Nil or unknown handle was dereferenced
    #[error("Attempting to dereference a 'Nil' memory instance")]
    NilDereference,
    /// Array index outside `0..size`
    #[error("Index out of bounds: {index},{size}")]
    ArrayBounds {
        /// The flattened index that was requested
        index: i64,
        /// Element count of the array
        size: i64,
    },
    /// Field or local slot outside its memory block
    #[error("Memory access out of range: {index},{size}")]
    MemoryAccess {
        /// The slot that was requested
        index: i64,
        /// Word count of the block
        size: i64,
    },
    /// Checked cast to a class the object is not derived from
    #[error("Invalid object cast: '{from}' to '{to}'")]
    InvalidCast {
        /// Runtime class of the object
        from: String,
        /// Requested target class
        to: String,
    },
    /// Integer or float division by zero
    #[error("Divide by zero")]
    DivideByZero,
    /// Call stack capacity exceeded
    #[error("call stack bounds have been exceeded")]
    StackOverflow,
    /// Pop from an empty operand stack
    #[error("operand stack underflow")]
    StackUnderflow,
    /// Class id that the program does not define
    #[error("unknown class id: {0}")]
    UnknownClass(i64),
    /// Method id that the class does not define
    #[error("unknown method id: class={class}, method={method}")]
    UnknownMethod {
        /// Owning class id
        class: i64,
        /// Method id within the class
        method: i64,
    },
    /// Jump to a label the method does not define
    #[error("unknown jump label: {0}")]
    UnknownLabel(i64),
    /// No ancestor of the receiver defines the virtual method
    #[error("unable to resolve virtual method call: '{0}'")]
    VirtualDispatch(String),
    /// An OS thread could not be created
    #[error("unable to create thread: {0}")]
    ThreadCreation(String),
    /// The heap cannot hand out more handles
    #[error("out of memory")]
    OutOfMemory,
    /// Instruction outside the supported instruction set
    #[error("unsupported instruction: {0}")]
    Unsupported(String),
    /// `ASSERT_TRUE` saw a false value
    #[error("assertion failed")]
    AssertionFailed,
    /// Program requested process exit with the given status
    #[error("exit requested with status {0}")]
    Exit(i32),
}

impl Fault {
    /// Returns true if the fault is a requested exit rather than an error.
    pub fn is_exit(&self) -> bool {
        matches!(self, Fault::Exit(_))
    }
}

/// A fault together with the trace of the thread that raised it.
///
/// # Examples
///
/// ```
/// use core_types::{Fault, StackFrame, VmError};
///
/// let error = VmError::new(Fault::StackOverflow, vec![StackFrame::new("A:run:,", 1)]);
/// let report = error.to_string();
///
/// assert!(report.starts_with(">>> call stack bounds have been exceeded <<<"));
/// assert!(report.contains("  method: pos=1, name=A:run:,"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmError {
    /// The fault that halted execution
    pub fault: Fault,
    /// Frames from the faulting method outward
    pub trace: Vec<StackFrame>,
}

impl VmError {
    /// Creates an error from a fault and its trace.
    pub fn new(fault: Fault, trace: Vec<StackFrame>) -> Self {
        Self { fault, trace }
    }

    /// Exit status the process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self.fault {
            Fault::Exit(code) => code,
            _ => 1,
        }
    }
}

impl From<Fault> for VmError {
    fn from(fault: Fault) -> Self {
        Self::new(fault, Vec::new())
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ">>> {} <<<", self.fault)?;
        writeln!(f, "Unwinding local stack:")?;
        for frame in &self.trace {
            writeln!(f, "  {}", frame)?;
        }
        write!(f, "  ...")
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.fault)
    }
}
