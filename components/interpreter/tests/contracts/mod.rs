//! Contract tests for interpreter API
//!
//! These tests pin the public surface other components build on.

use std::sync::Arc;

use bytecode_system::{ClassBuilder, MethodBuilder, MethodRef, NativeCode, Opcode, ProgramBuilder};
use core_types::{Fault, Word, NIL};
use interpreter::{Interpreter, NativeCall, NativeExecutor, Runtime, RuntimeConfig, VERSION};

fn program() -> Arc<bytecode_system::Program> {
    let mut builder = ProgramBuilder::new();
    let main = builder.add_class(
        ClassBuilder::new("Main")
            .method(
                MethodBuilder::new("Main:,")
                    .emit_operand(Opcode::LoadIntLit, 1)
                    .emit_operand(Opcode::LoadIntLit, 0)
                    .call(0, 1)
                    .emit(Opcode::Rtrn),
            )
            .method(
                MethodBuilder::new("Inc:i,")
                    .param(bytecode_system::ParamType::Int)
                    .emit_operand(Opcode::LoadIntLit, 1)
                    .emit(Opcode::AddInt)
                    .emit(Opcode::Rtrn),
            ),
    );
    builder.entry(main, 0);
    Arc::new(builder.build().unwrap())
}

/// Test Runtime::run() leaves the entry method's results on the stack
#[test]
fn test_runtime_run_contract() {
    let runtime = Runtime::new(program(), RuntimeConfig::default()).unwrap();
    assert_eq!(runtime.run().unwrap(), vec![2]);
    assert_eq!(runtime.memory().mutator_count(), 0);
}

/// Test Runtime::call() runs one method with caller-supplied arguments
#[test]
fn test_runtime_call_contract() {
    let runtime = Runtime::new(program(), RuntimeConfig::default()).unwrap();
    let stack = runtime.call(MethodRef::new(0, 1), NIL, &[41]).unwrap();
    assert_eq!(stack, vec![42]);
}

/// Test Interpreter::execute() reports unknown methods as faults
#[test]
fn test_execute_unknown_method_contract() {
    let runtime = Runtime::new(program(), RuntimeConfig::default()).unwrap();
    let context = runtime.new_context();
    let interpreter = Interpreter::new(runtime.clone(), context);
    let err = interpreter.execute(MethodRef::new(0, 9), NIL).unwrap_err();
    assert_eq!(err.fault, Fault::UnknownMethod { class: 0, method: 9 });
}

/// Test execute() restores the caller's frame after a nested call
#[test]
fn test_nested_execute_contract() {
    let runtime = Runtime::new(program(), RuntimeConfig::default()).unwrap();
    let context = runtime.new_context();
    let interpreter = Interpreter::new(runtime.clone(), context.clone());
    {
        let mut state = context.lock();
        state.frame = Some(runtime.frame_pool().acquire(runtime.program().method(0, 0).unwrap(), NIL));
        state.push_int(5);
    }
    interpreter.execute(MethodRef::new(0, 1), NIL).unwrap();
    let state = context.lock();
    assert_eq!(state.stack, vec![6]);
    assert_eq!(state.frame.as_ref().map(|frame| frame.method_id), Some(0));
    assert!(state.calls.is_empty());
}

struct Tripler;

impl NativeExecutor for Tripler {
    fn compile(&self, _method: &bytecode_system::Method) -> Option<NativeCode> {
        Some(Arc::new(3 as Word))
    }

    fn execute(&self, code: &NativeCode, call: &mut NativeCall<'_>) -> Result<(), Fault> {
        let factor = code.downcast_ref::<Word>().copied().unwrap_or(1);
        let value = call.pop_int()?;
        call.push_int(value * factor);
        Ok(())
    }
}

/// Test native-flagged calls go through the installed executor
#[test]
fn test_native_executor_contract() {
    let mut builder = ProgramBuilder::new();
    let main = builder.add_class(
        ClassBuilder::new("Main")
            .method(
                MethodBuilder::new("Main:,")
                    .emit_operand(Opcode::LoadIntLit, 7)
                    .emit_operand(Opcode::LoadIntLit, 0)
                    .emit_operands(Opcode::MthdCall, 0, 1, 1)
                    .emit(Opcode::Rtrn),
            )
            .method(MethodBuilder::new("Triple:i,").emit(Opcode::Rtrn)),
    );
    builder.entry(main, 0);
    let runtime = Runtime::with_executor(
        Arc::new(builder.build().unwrap()),
        RuntimeConfig::default(),
        Arc::new(Tripler),
    )
    .unwrap();
    let stack: Vec<Word> = runtime.run().unwrap();
    assert_eq!(stack, vec![21]);
    assert!(runtime.program().method(0, 1).unwrap().native_code().is_some());
}

/// Test the version string is the package version
#[test]
fn test_version_contract() {
    assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
}
