//! Stack frame type for fault traces.

use std::fmt;

/// Represents a single method activation in a fault trace.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame::new("Counter:Next:i,", 2);
///
/// assert_eq!(frame.method_name, "Counter:Next:i,");
/// assert_eq!(frame.to_string(), "method: pos=2, name=Counter:Next:i,");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Qualified method name `Class:method:signature`
    pub method_name: String,
    /// Depth of the activation in the call stack (0 = outermost)
    pub position: usize,
}

impl StackFrame {
    /// Creates a frame entry.
    pub fn new(method_name: impl Into<String>, position: usize) -> Self {
        Self {
            method_name: method_name.into(),
            position,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method: pos={}, name={}", self.position, self.method_name)
    }
}
