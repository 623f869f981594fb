//! Core machine types and fault handling for the stack VM.
//!
//! This crate provides the foundational types shared by every component,
//! including the native word model, the runtime fault taxonomy, and the
//! frame-name trace printed when execution halts on a fatal fault.
//!
//! # Overview
//!
//! - [`Word`] - Native machine word held by operand stacks, frames and heap payloads
//! - [`Fault`] - Runtime faults detected by the interpreter and the heap
//! - [`VmError`] - A fault paired with the call-stack trace at the point it occurred
//! - [`StackFrame`] - One method entry in that trace
//!
//! # Examples
//!
//! ```
//! use core_types::{Fault, StackFrame, VmError, float_to_words, words_to_float};
//!
//! let words = float_to_words(2.5);
//! assert_eq!(words_to_float(&words), 2.5);
//!
//! let error = VmError::new(
//!     Fault::NilDereference,
//!     vec![StackFrame::new("Hello:Main:o.System.String*,", 0)],
//! );
//! assert!(error.to_string().contains("Unwinding local stack:"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;
mod word;

pub use error::{Fault, VmError};
pub use source::StackFrame;
pub use word::{
    float_to_words, pack_function, unpack_function, words_to_float, Word, FLOAT_WORDS, NIL,
    WORD_BITS, WORD_BYTES,
};
