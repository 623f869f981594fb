//! Unit tests for StackFrame

use core_types::StackFrame;

#[cfg(test)]
mod stack_frame_tests {
    use super::*;

    #[test]
    fn test_stack_frame_clone() {
        let frame = StackFrame::new("Main:Run:,", 0);
        let copy = frame.clone();
        assert_eq!(frame, copy);
    }

    #[test]
    fn test_stack_frame_display() {
        let frame = StackFrame::new("Queue:Push:o.Base,", 7);
        assert_eq!(frame.to_string(), "method: pos=7, name=Queue:Push:o.Base,");
    }

    #[test]
    fn test_stack_frame_accepts_owned_name() {
        let name = String::from("X:y:,");
        let frame = StackFrame::new(name, 1);
        assert_eq!(frame.method_name, "X:y:,");
    }
}
