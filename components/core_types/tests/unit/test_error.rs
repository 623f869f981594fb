//! Unit tests for Fault and VmError

use core_types::{Fault, StackFrame, VmError};

#[cfg(test)]
mod fault_tests {
    use super::*;

    #[test]
    fn test_nil_dereference_message() {
        assert_eq!(
            Fault::NilDereference.to_string(),
            "Attempting to dereference a 'Nil' memory instance"
        );
    }

    #[test]
    fn test_invalid_cast_message() {
        let fault = Fault::InvalidCast {
            from: "Apple".to_string(),
            to: "Car".to_string(),
        };
        assert_eq!(fault.to_string(), "Invalid object cast: 'Apple' to 'Car'");
    }

    #[test]
    fn test_array_bounds_negative_index() {
        let fault = Fault::ArrayBounds { index: -1, size: 4 };
        assert!(fault.to_string().contains("-1,4"));
    }

    #[test]
    fn test_only_exit_is_exit() {
        assert!(Fault::Exit(2).is_exit());
        assert!(!Fault::StackOverflow.is_exit());
        assert!(!Fault::OutOfMemory.is_exit());
    }
}

#[cfg(test)]
mod vm_error_tests {
    use super::*;

    #[test]
    fn test_report_format() {
        let error = VmError::new(
            Fault::StackOverflow,
            vec![StackFrame::new("R:down:i,", 1), StackFrame::new("R:Main:,", 0)],
        );
        let expected = ">>> call stack bounds have been exceeded <<<\n\
                        Unwinding local stack:\n  \
                        method: pos=1, name=R:down:i,\n  \
                        method: pos=0, name=R:Main:,\n  \
                        ...";
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_empty_trace() {
        let error = VmError::from(Fault::OutOfMemory);
        assert!(error.trace.is_empty());
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_error_source_is_fault() {
        use std::error::Error;
        let error = VmError::from(Fault::NilDereference);
        assert!(error.source().is_some());
    }
}
