//! Tests for the adaptive collection threshold

use memory_manager::{DetachedRoots, GcConfig, MemoryManager};

use crate::common::manager;

fn unproductive_cycles(memory: &MemoryManager, count: usize) {
    for _ in 0..count {
        assert_eq!(memory.collect_now(&DetachedRoots::new()).unwrap().freed_bytes, 0);
    }
}

fn productive_cycles(memory: &MemoryManager, count: usize) {
    let roots = DetachedRoots::new();
    for _ in 0..count {
        memory.allocate_object(0, &roots).unwrap();
        assert!(memory.collect_now(&roots).unwrap().freed_bytes > 0);
    }
}

#[test]
fn test_doubles_after_unproductive_cycles() {
    let memory = manager(GcConfig::default());
    let start = memory.threshold();
    unproductive_cycles(&memory, 3);
    assert_eq!(memory.threshold(), start);
    unproductive_cycles(&memory, 1);
    assert_eq!(memory.threshold(), start * 2);
    assert_eq!(memory.stats().threshold_raises, 1);
}

#[test]
fn test_halves_after_productive_cycles_but_not_below_baseline() {
    let memory = manager(GcConfig::default());
    let baseline = memory.threshold();
    unproductive_cycles(&memory, 8);
    assert_eq!(memory.threshold(), baseline * 4);

    productive_cycles(&memory, 8);
    assert_eq!(memory.threshold(), baseline * 2);
    productive_cycles(&memory, 8);
    assert_eq!(memory.threshold(), baseline);
    productive_cycles(&memory, 8);
    assert_eq!(memory.threshold(), baseline);
    assert_eq!(memory.stats().threshold_drops, 2);
}

#[test]
fn test_productive_cycle_resets_unproductive_count() {
    let memory = manager(GcConfig::default());
    let start = memory.threshold();
    unproductive_cycles(&memory, 3);
    productive_cycles(&memory, 1);
    unproductive_cycles(&memory, 3);
    assert_eq!(memory.threshold(), start);
}

#[test]
fn test_allocation_past_threshold_collects() {
    let memory = manager(GcConfig::new().with_threshold(1024));
    let roots = DetachedRoots::new();
    for _ in 0..200 {
        memory.allocate_object(0, &roots).unwrap();
    }
    let stats = memory.stats();
    assert!(stats.cycles > 0);
    assert!(stats.bytes_freed > 0);
    assert!(memory.live_bytes() < 2048);
}

#[test]
fn test_trace_config_is_kept() {
    let memory = manager(GcConfig::new().with_trace(true));
    assert!(memory.config().trace);
    assert!(memory.collect_now(&DetachedRoots::new()).is_some());
}

#[test]
fn test_collect_respects_threshold() {
    let memory = manager(GcConfig::new().with_threshold(1024));
    let roots = DetachedRoots::new();
    memory.allocate_object(0, &roots).unwrap();
    assert!(memory.collect(&roots).is_none());
    assert_eq!(memory.stats().cycles, 0);

    let first = memory.allocate_object(0, &roots).unwrap();
    let size = memory.get(first).unwrap().bytes();
    while memory.live_bytes() + size <= memory.threshold() {
        memory.allocate_object(0, &roots).unwrap();
    }
    assert_eq!(memory.stats().cycles, 0);
    // the next allocation would cross the threshold, so it collects first
    memory.allocate_object(0, &roots).unwrap();
    assert_eq!(memory.stats().cycles, 1);
}
