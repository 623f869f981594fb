//! Unit tests for interpreter components

use std::sync::Arc;

use bytecode_system::{ClassBuilder, MemoryContext, MethodBuilder, MethodRef, Opcode, ParamType, ProgramBuilder};
use core_types::{Fault, NIL};
use interpreter::dispatch::{float_text, int_text, parse_float, parse_int};
use interpreter::{
    DispatchCache, FramePool, Runtime, RuntimeConfig, StdioMode, ThreadRegistry, ThreadState,
    CALL_STACK_SIZE,
};

fn program_with(classes: Vec<ClassBuilder>) -> Arc<bytecode_system::Program> {
    let mut builder = ProgramBuilder::new();
    for class in classes {
        builder.add_class(class);
    }
    builder.entry(0, 0);
    Arc::new(builder.build().unwrap())
}

// ============================================================================
// ThreadState Tests
// ============================================================================

#[test]
fn test_thread_state_int_stack() {
    let mut state = ThreadState::new(1);
    state.push_int(1);
    state.push_int(2);
    assert_eq!(state.top_int(), Ok(2));
    state.swap_int().unwrap();
    assert_eq!(state.pop_int(), Ok(1));
    assert_eq!(state.pop_int(), Ok(2));
    assert_eq!(state.pop_int(), Err(Fault::StackUnderflow));
}

#[test]
fn test_thread_state_float_stack() {
    let mut state = ThreadState::new(1);
    state.push_float(-2.75);
    assert_eq!(state.top_float(), Ok(-2.75));
    assert_eq!(state.pop_float(), Ok(-2.75));
    assert!(state.stack.is_empty());
}

#[test]
fn test_thread_state_without_frame() {
    let state = ThreadState::new(7);
    assert_eq!(state.id, 7);
    assert!(state.frame().is_err());
}

// ============================================================================
// FramePool Tests
// ============================================================================

#[test]
fn test_frame_pool_reuses_buffers() {
    let program = program_with(vec![ClassBuilder::new("Main").method(
        MethodBuilder::new("Main:,")
            .param(ParamType::Int)
            .local(ParamType::Float)
            .emit(Opcode::Rtrn),
    )]);
    let method = program.method(0, 0).unwrap();
    let pool = FramePool::new();

    let mut frame = pool.acquire(method, 99);
    assert_eq!(frame.self_ref(), 99);
    frame.store(1, 5).unwrap();
    pool.release(frame);
    assert_eq!(pool.available(), 1);

    let frame = pool.acquire(method, NIL);
    assert_eq!(pool.available(), 0);
    assert_eq!(frame.load(1), Ok(NIL));
    assert_eq!(frame.locals.len(), method.frame_words());
}

#[test]
fn test_frame_slot_out_of_range() {
    let program = program_with(vec![
        ClassBuilder::new("Main").method(MethodBuilder::new("Main:,").emit(Opcode::Rtrn))
    ]);
    let frame = FramePool::new().acquire(program.method(0, 0).unwrap(), NIL);
    assert!(matches!(frame.load(40), Err(Fault::MemoryAccess { .. })));
}

// ============================================================================
// DispatchCache Tests
// ============================================================================

#[test]
fn test_dispatch_cache_memoizes() {
    let program = program_with(vec![
        ClassBuilder::new("Shape")
            .method(MethodBuilder::new("Area:,").virtual_method().emit(Opcode::Rtrn)),
        ClassBuilder::new("Square")
            .parent(0)
            .method(MethodBuilder::new("Area:,").emit(Opcode::Rtrn)),
        ClassBuilder::new("Blob").parent(0),
    ]);
    let cache = DispatchCache::new();
    let declared = MethodRef::new(0, 0);

    assert_eq!(cache.resolve(&program, 1, declared), Ok(MethodRef::new(1, 0)));
    assert_eq!(cache.resolve(&program, 1, declared), Ok(MethodRef::new(1, 0)));
    assert_eq!(cache.resolve(&program, 2, declared), Ok(MethodRef::new(0, 0)));
    assert_eq!(cache.misses(), 2);
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.len(), 2);
}

// ============================================================================
// ThreadRegistry Tests
// ============================================================================

#[test]
fn test_thread_registry_join_all() {
    let registry = ThreadRegistry::new();
    for id in 0..3 {
        let handle = std::thread::spawn(|| {});
        registry.lock().insert(id, handle);
    }
    assert_eq!(registry.len(), 3);
    assert!(registry.contains(1));
    registry.join_all();
    assert!(registry.is_empty());
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_runtime_config_builders() {
    let config = RuntimeConfig::new()
        .with_stdio_mode(StdioMode::Binary)
        .with_gc_threshold(4096)
        .with_gc_trace(true);
    assert_eq!(config.stdio, StdioMode::Binary);
    assert_eq!(config.gc.threshold, 4096);
    assert!(config.gc.trace);
    assert_eq!(CALL_STACK_SIZE, 1024);
}

// ============================================================================
// Conversion Tests
// ============================================================================

#[test]
fn test_parse_int_bases() {
    assert_eq!(parse_int("777", 8), 511);
    assert_eq!(parse_int("z", 36), 35);
    assert_eq!(parse_int("12", 99), 12);
    assert_eq!(parse_int("+0X10", 10), 16);
    assert_eq!(parse_int("", 10), 0);
}

#[test]
fn test_number_text() {
    assert_eq!(int_text(-42, 10, None), "-42");
    assert_eq!(int_text(64, 8, Some("oct")), "100");
    assert_eq!(float_text(1.0e-7, Some("scientific"), Some("2")), "1.00e-07");
    assert_eq!(parse_float("2.5e3"), 2500.0);
}

// ============================================================================
// Runtime Tests
// ============================================================================

#[test]
fn test_runtime_statics_start_nil() {
    let program = program_with(vec![ClassBuilder::new("Main")
        .static_field(ParamType::Int)
        .method(
            MethodBuilder::new("Main:,")
                .emit(Opcode::LoadClsMem)
                .emit_var(Opcode::LoadIntVar, 0, MemoryContext::Cls)
                .emit(Opcode::Rtrn),
        )]);
    let runtime = Runtime::new(program, RuntimeConfig::default()).unwrap();
    assert_eq!(runtime.run().unwrap(), vec![0]);
}
