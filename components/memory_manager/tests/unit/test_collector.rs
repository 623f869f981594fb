//! Tests for marking and sweeping

use std::sync::{Arc, Barrier};
use std::thread;

use memory_manager::{ArrayKind, DetachedRoots, GcConfig, HEADER_WORDS};

use crate::common::manager;

#[test]
fn test_reachable_chain_survives() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let a = memory.allocate_object(0, &roots).unwrap();
    let b = memory.allocate_object(0, &roots).unwrap();
    let c = memory.allocate_object(0, &roots).unwrap();
    memory.get(a).unwrap().words().set(0, b);
    memory.get(b).unwrap().words().set(0, c);

    let report = memory.collect_now(&DetachedRoots::with_stack(vec![a])).unwrap();
    assert_eq!(report.freed_blocks, 0);
    assert!(memory.contains(a) && memory.contains(b) && memory.contains(c));
}

#[test]
fn test_unreachable_chain_is_reclaimed() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let a = memory.allocate_object(0, &roots).unwrap();
    let b = memory.allocate_object(0, &roots).unwrap();
    memory.get(a).unwrap().words().set(0, b);

    let report = memory.collect_now(&roots).unwrap();
    assert_eq!(report.freed_blocks, 2);
    assert!(!memory.contains(a));
    assert!(!memory.contains(b));
}

#[test]
fn test_self_referencing_object_is_reclaimed() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let a = memory.allocate_object(0, &roots).unwrap();
    memory.get(a).unwrap().words().set(0, a);

    let report = memory.collect_now(&DetachedRoots::with_stack(vec![a])).unwrap();
    assert_eq!(report.freed_blocks, 0);

    let report = memory.collect_now(&roots).unwrap();
    assert_eq!(report.freed_blocks, 1);
    assert!(!memory.contains(a));
}

#[test]
fn test_scalar_field_holding_a_handle_does_not_retain() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let a = memory.allocate_object(0, &roots).unwrap();
    let b = memory.allocate_object(0, &roots).unwrap();
    memory.get(a).unwrap().words().set(1, b);

    memory.collect_now(&DetachedRoots::with_stack(vec![a])).unwrap();
    assert!(memory.contains(a));
    assert!(!memory.contains(b));
}

#[test]
fn test_collection_is_idempotent() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let kept = memory.allocate_object(0, &roots).unwrap();
    memory.allocate_object(0, &roots).unwrap();

    let live = DetachedRoots::with_stack(vec![kept]);
    memory.collect_now(&live).unwrap();
    let handles = memory.handles();
    let second = memory.collect_now(&live).unwrap();
    assert_eq!(second.freed_blocks, 0);
    assert_eq!(memory.handles(), handles);
    assert!(memory.handles().iter().all(|h| !memory.get(*h).unwrap().is_marked()));
}

#[test]
fn test_object_array_elements_are_followed() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let array = memory.allocate_array(ArrayKind::Object, &[3], &roots).unwrap();
    let element = memory.allocate_object(0, &roots).unwrap();
    let block = memory.get(array).unwrap();
    block.words().set(block.array_data_offset() + 2, element);
    drop(block);

    memory.collect_now(&DetachedRoots::with_stack(vec![array])).unwrap();
    assert!(memory.contains(element));
}

#[test]
fn test_scalar_arrays_are_leaves() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let bytes = memory.allocate_array(ArrayKind::Byte, &[2], &roots).unwrap();
    let floats = memory.allocate_array(ArrayKind::Float, &[2], &roots).unwrap();
    let object = memory.allocate_object(0, &roots).unwrap();
    for array in [bytes, floats] {
        let block = memory.get(array).unwrap();
        block.words().set(block.array_data_offset(), object);
    }

    memory
        .collect_now(&DetachedRoots::with_stack(vec![bytes, floats]))
        .unwrap();
    assert!(memory.contains(bytes) && memory.contains(floats));
    assert!(!memory.contains(object));
}

#[test]
fn test_function_holder_retains_instance() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let holder = memory.allocate_function(&roots).unwrap();
    let instance = memory.allocate_object(0, &roots).unwrap();
    memory.get(holder).unwrap().words().set(1, instance);

    memory.collect_now(&DetachedRoots::with_stack(vec![holder])).unwrap();
    assert!(memory.contains(instance));
}

#[test]
fn test_statics_are_roots() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let object = memory.allocate_object(0, &roots).unwrap();
    let statics = memory.statics(0).unwrap();
    memory.get(statics).unwrap().words().set(0, object);

    memory.collect_now(&roots).unwrap();
    assert!(memory.contains(object));
}

#[test]
fn test_swept_buffer_is_reused() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    memory.allocate_array(ArrayKind::Int, &[10], &roots).unwrap();
    memory.collect_now(&roots).unwrap();
    let hits = memory.stats().pool_hits;
    memory.allocate_array(ArrayKind::Int, &[10], &roots).unwrap();
    assert_eq!(memory.stats().pool_hits, hits + 1);
}

#[test]
fn test_live_bytes_accounting() {
    let memory = manager(GcConfig::default());
    let roots = DetachedRoots::new();
    let before = memory.live_bytes();
    memory.allocate_array(ArrayKind::Int, &[4], &roots).unwrap();
    let word = std::mem::size_of::<isize>();
    assert_eq!(memory.live_bytes(), before + (HEADER_WORDS + 2 + 1 + 4) * word);
    memory.collect_now(&roots).unwrap();
    assert_eq!(memory.live_bytes(), before);
}

#[test]
fn test_concurrent_threshold_crossing_runs_one_cycle() {
    let config = GcConfig::new().with_threshold(4096);
    let memory = Arc::new(manager(config));
    let roots = DetachedRoots::new();
    let first = memory.allocate_object(0, &roots).unwrap();
    let size = memory.get(first).unwrap().bytes();
    while memory.live_bytes() + size <= memory.threshold() {
        memory.allocate_object(0, &roots).unwrap();
    }
    assert_eq!(memory.stats().cycles, 0);

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let memory = Arc::clone(&memory);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let roots = DetachedRoots::new();
                memory.allocate_object(0, &roots).unwrap();
                memory.allocate_array(ArrayKind::Char, &[3], &roots).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = memory.stats();
    assert_eq!(stats.cycles, 1);
    let accounted: usize = memory
        .handles()
        .iter()
        .map(|h| memory.get(*h).unwrap().bytes())
        .sum();
    assert_eq!(accounted, memory.live_bytes());
}
