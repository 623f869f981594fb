//! Public API contract for memory_manager

use std::sync::Arc;

use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, ProgramBuilder};
use core_types::{Fault, NIL};
use memory_manager::{
    ArrayKind, BlockKind, DetachedRoots, GcConfig, GcStats, MemoryManager, Monitor,
    DEFAULT_THRESHOLD, SIZE_CLASSES,
};

fn empty_manager() -> MemoryManager {
    let mut builder = ProgramBuilder::new();
    let cls = builder.add_class(
        ClassBuilder::new("Main").method(MethodBuilder::new("Main:,").emit(Opcode::Rtrn)),
    );
    builder.entry(cls, 0);
    MemoryManager::new(Arc::new(builder.build().unwrap()), GcConfig::default()).unwrap()
}

#[test]
fn contract_size_classes() {
    assert_eq!(SIZE_CLASSES.len(), 18);
    assert_eq!(SIZE_CLASSES[0], 16);
    assert_eq!(SIZE_CLASSES[17], 2 << 20);
}

#[test]
fn contract_default_threshold() {
    assert_eq!(DEFAULT_THRESHOLD, 512 * 1024);
    assert_eq!(GcConfig::default().uncollected_limit, 4);
    assert_eq!(GcConfig::default().collected_limit, 8);
}

#[test]
fn contract_nil_and_unknown_handles() {
    let memory = empty_manager();
    assert_eq!(memory.get(NIL).unwrap_err(), Fault::NilDereference);
    assert_eq!(memory.get(12345 << 4).unwrap_err(), Fault::NilDereference);
    assert!(!memory.contains(NIL));
}

#[test]
fn contract_unknown_class() {
    let memory = empty_manager();
    assert_eq!(
        memory.allocate_object(9, &DetachedRoots::new()),
        Err(Fault::UnknownClass(9))
    );
}

#[test]
fn contract_block_kinds() {
    let memory = empty_manager();
    let roots = DetachedRoots::new();
    let array = memory.allocate_array(ArrayKind::Float, &[1], &roots).unwrap();
    assert_eq!(memory.get(array).unwrap().kind(), BlockKind::FloatArray);
    let function = memory.allocate_function(&roots).unwrap();
    assert_eq!(memory.get(function).unwrap().kind(), BlockKind::Function);
    let statics = memory.statics(0).unwrap();
    assert_eq!(
        memory.get(statics).unwrap().kind(),
        BlockKind::Statics { class_id: 0 }
    );
}

#[test]
fn contract_monitor_is_per_object() {
    let memory = empty_manager();
    let roots = DetachedRoots::new();
    let object = memory.allocate_object(0, &roots).unwrap();
    let block = memory.get(object).unwrap();
    assert!(!block.has_monitor());
    let monitor: Arc<Monitor> = block.monitor();
    assert!(Arc::ptr_eq(&monitor, &block.monitor()));
}

#[test]
fn contract_stats_snapshot() {
    let memory = empty_manager();
    let stats: GcStats = memory.stats();
    assert_eq!(stats.cycles, 0);
    assert_eq!(stats.threshold, DEFAULT_THRESHOLD);
    assert_eq!(stats.live_bytes, memory.live_bytes());
}
