//! Tests for thread, JIT and debugger roots

use std::sync::Arc;

use core_types::pack_function;
use memory_manager::{DetachedRoots, GcConfig, Words};

use crate::common::{manager, TestThread};

#[test]
fn test_registered_thread_stack_is_scanned() {
    let memory = manager(GcConfig::default());
    let thread = TestThread::new(7);
    memory.register_mutator(thread.clone());
    let object = memory.allocate_object(0, &DetachedRoots::new()).unwrap();
    thread.state.lock().stack.push(object);

    memory.collect_now(&DetachedRoots::new()).unwrap();
    assert!(memory.contains(object));

    thread.state.lock().stack.clear();
    memory.collect_now(&DetachedRoots::new()).unwrap();
    assert!(!memory.contains(object));
}

#[test]
fn test_unregistered_thread_is_not_scanned() {
    let memory = manager(GcConfig::default());
    let thread = TestThread::new(3);
    memory.register_mutator(thread.clone());
    let object = memory.allocate_object(0, &DetachedRoots::new()).unwrap();
    thread.state.lock().stack.push(object);
    memory.unregister_mutator(3);
    assert_eq!(memory.mutator_count(), 0);

    memory.collect_now(&DetachedRoots::new()).unwrap();
    assert!(!memory.contains(object));
}

#[test]
fn test_frames_are_scanned_by_declaration() {
    let memory = manager(GcConfig::default());
    let thread = TestThread::new(1);
    memory.register_mutator(thread.clone());
    let roots = DetachedRoots::new();
    let receiver = memory.allocate_object(0, &roots).unwrap();
    let param = memory.allocate_object(0, &roots).unwrap();
    let scalar = memory.allocate_object(0, &roots).unwrap();
    let bound = memory.allocate_object(0, &roots).unwrap();

    // slot 0 self, then (o, i, fn: packed id + instance)
    let locals = vec![receiver, param, scalar, pack_function(0, 0), bound];
    thread.state.lock().frames.push((0, 0, locals));

    memory.collect_now(&roots).unwrap();
    assert!(memory.contains(receiver));
    assert!(memory.contains(param));
    assert!(memory.contains(bound));
    assert!(!memory.contains(scalar));
}

#[test]
fn test_jit_root_lifetime() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let receiver = memory.allocate_object(0, &roots).unwrap();
    let param = memory.allocate_object(0, &roots).unwrap();
    let locals = Arc::new(Words::from_slice(&[receiver, param, 0, 0, 0]));
    memory.register_jit_root(0, 0, receiver, locals.clone(), 2);

    memory.collect_now(&roots).unwrap();
    assert!(memory.contains(receiver) && memory.contains(param));

    memory.unregister_jit_root(&locals);
    memory.collect_now(&roots).unwrap();
    assert!(!memory.contains(receiver) && !memory.contains(param));
}

#[test]
fn test_jit_root_size_bounds_the_scan() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let param = memory.allocate_object(0, &roots).unwrap();
    let locals = Arc::new(Words::from_slice(&[0, param]));
    memory.register_jit_root(0, 0, 0, locals, 1);

    memory.collect_now(&roots).unwrap();
    assert!(!memory.contains(param));
}

#[test]
fn test_debug_root_is_conservative() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let object = memory.allocate_object(0, &roots).unwrap();
    let frame = Arc::new(Words::from_slice(&[17, object, -3]));
    memory.register_debug_root(frame.clone());

    memory.collect_now(&roots).unwrap();
    assert!(memory.contains(object));

    memory.unregister_debug_root(&frame);
    memory.collect_now(&roots).unwrap();
    assert!(!memory.contains(object));
}
