//! Serializer Trap Integration Tests
//!
//! Object graphs written through the serialization traps and read back into
//! fresh heap blocks.

use bytecode_system::{ClassBuilder, MemoryContext, MethodBuilder, Opcode, ParamType, TrapId};
use core_types::Word;
use integration_tests::runtime;
use interpreter::RuntimeConfig;

const LOCL: MemoryContext = MemoryContext::Locl;
const INST: MemoryContext = MemoryContext::Inst;

/// Main (class 0), Serializer (class 1: buffer, position; Write, Read,
/// WriteFloat, ReadFloat), Node
/// (class 2: next, value) and Pair (class 3: left, right, items).
fn classes(main: MethodBuilder) -> Vec<ClassBuilder> {
    let write = MethodBuilder::new("Write:o.Node,")
        .param(ParamType::Object)
        .emit_var(Opcode::StorLoclIntVar, 0, LOCL)
        .trap(TrapId::SerlObjInst, 0)
        .emit(Opcode::Rtrn);
    let read = MethodBuilder::new("Read:,")
        .trap(TrapId::DeserlObjInst, 0)
        .emit(Opcode::Rtrn);
    let write_float = MethodBuilder::new("WriteFloat:f,")
        .param(ParamType::Float)
        .emit_var(Opcode::StorFloatVar, 0, LOCL)
        .trap(TrapId::SerlFloat, 0)
        .emit(Opcode::Rtrn);
    let read_float = MethodBuilder::new("ReadFloat:,")
        .trap(TrapId::DeserlFloat, 0)
        .emit(Opcode::Rtrn);
    vec![
        ClassBuilder::new("Main").method(main),
        ClassBuilder::new("Serializer")
            .field(ParamType::ByteArray)
            .field(ParamType::Int)
            .method(write)
            .method(read)
            .method(write_float)
            .method(read_float),
        ClassBuilder::new("Node")
            .field(ParamType::Object)
            .field(ParamType::Int),
        ClassBuilder::new("Pair")
            .field(ParamType::Object)
            .field(ParamType::Object)
            .field(ParamType::ObjectArray),
    ]
}

/// Writes local 0 through a fresh serializer (local 1), rewinds and reads
/// the copy into local 2.
fn write_and_read(main: MethodBuilder) -> MethodBuilder {
    main.emit_operand(Opcode::NewObjInst, 1)
        .emit_var(Opcode::StorLoclIntVar, 1, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 1, LOCL)
        .call(1, 0)
        .emit_operand(Opcode::LoadIntLit, 0)
        .emit_var(Opcode::LoadLoclIntVar, 1, LOCL)
        .emit_var(Opcode::StorIntVar, 1, INST)
        .emit_var(Opcode::LoadLoclIntVar, 1, LOCL)
        .call(1, 1)
        .emit_var(Opcode::StorLoclIntVar, 2, LOCL)
}

/// Builds `node` (local 0) with `node.value = 7` and `node.next` set by
/// `link`, writes it, rewinds and reads the copy into local 2.
fn round_trip(link: impl FnOnce(MethodBuilder) -> MethodBuilder) -> MethodBuilder {
    let main = MethodBuilder::new("Main:,")
        .local(ParamType::Object)
        .local(ParamType::Object)
        .local(ParamType::Object)
        .emit_operand(Opcode::NewObjInst, 2)
        .emit_var(Opcode::StorLoclIntVar, 0, LOCL)
        .emit_operand(Opcode::LoadIntLit, 7)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_var(Opcode::StorIntVar, 1, INST);
    write_and_read(link(main))
}

#[test]
fn test_self_reference_round_trips() {
    // copy.value, copy.next == copy, copy != node
    let main = round_trip(|main| {
        main.emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
            .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
            .emit_var(Opcode::StorIntVar, 0, INST)
    })
    .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
    .emit_var(Opcode::LoadIntVar, 1, INST)
    .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
    .emit_var(Opcode::LoadIntVar, 0, INST)
    .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
    .emit(Opcode::EqlInt)
    .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
    .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
    .emit(Opcode::NeqlInt)
    .emit(Opcode::Rtrn);

    let runtime = runtime(classes(main), RuntimeConfig::default());
    assert_eq!(runtime.run().unwrap(), vec![7, 1, 1]);
}

#[test]
fn test_nil_field_round_trips() {
    let main = round_trip(|main| main)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 0, INST)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 1, INST)
        .emit(Opcode::Rtrn);

    let runtime = runtime(classes(main), RuntimeConfig::default());
    assert_eq!(runtime.run().unwrap(), vec![0, 7]);
}

#[test]
fn test_round_trip_under_collection_pressure() {
    let main = round_trip(|main| {
        main.emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
            .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
            .emit_var(Opcode::StorIntVar, 0, INST)
    })
    .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
    .emit(Opcode::Rtrn);

    let runtime = runtime(classes(main), RuntimeConfig::default().with_gc_threshold(64));
    let copy: Word = runtime.run().unwrap()[0];

    let block = runtime.memory().get(copy).unwrap();
    assert_eq!(block.words().load(0).unwrap(), copy);
    assert_eq!(block.words().load(1).unwrap(), 7);
    assert!(runtime.memory().stats().cycles > 0);
}

/// Builds `pair` (local 0) whose left, right and both `items` elements are
/// one node (local 3) with value 5, then round-trips it.
fn shared_child() -> MethodBuilder {
    let main = MethodBuilder::new("Main:,")
        .local(ParamType::Object)
        .local(ParamType::Object)
        .local(ParamType::Object)
        .local(ParamType::Object)
        .emit_operand(Opcode::NewObjInst, 3)
        .emit_var(Opcode::StorLoclIntVar, 0, LOCL)
        .emit_operand(Opcode::NewObjInst, 2)
        .emit_var(Opcode::StorLoclIntVar, 3, LOCL)
        .emit_operand(Opcode::LoadIntLit, 5)
        .emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
        .emit_var(Opcode::StorIntVar, 1, INST)
        .emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_var(Opcode::StorIntVar, 0, INST)
        .emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_var(Opcode::StorIntVar, 1, INST)
        .emit_operand(Opcode::LoadIntLit, 2)
        .emit_operand(Opcode::NewIntAry, 1)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_var(Opcode::StorIntVar, 2, INST);
    let main = (0..2).fold(main, |main, index| {
        main.emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
            .emit_operand(Opcode::LoadIntLit, index)
            .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
            .emit_var(Opcode::LoadIntVar, 2, INST)
            .emit_operand(Opcode::StorIntAryElm, 1)
    });
    write_and_read(main)
}

/// Pushes `copy.items[index] == copy.left`.
fn item_is_left(main: MethodBuilder, index: i64) -> MethodBuilder {
    main.emit_operand(Opcode::LoadIntLit, index)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 2, INST)
        .emit_operand(Opcode::LoadIntAryElm, 1)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 0, INST)
        .emit(Opcode::EqlInt)
}

#[test]
fn test_shared_child_stays_shared() {
    // copy.left == copy.right, copy.left != original child, copy.left.value
    let main = shared_child()
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 0, INST)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 1, INST)
        .emit(Opcode::EqlInt)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 0, INST)
        .emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
        .emit(Opcode::NeqlInt)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit_var(Opcode::LoadIntVar, 0, INST)
        .emit_var(Opcode::LoadIntVar, 1, INST)
        .emit(Opcode::Rtrn);

    let runtime = runtime(classes(main), RuntimeConfig::default());
    assert_eq!(runtime.run().unwrap(), vec![1, 1, 5]);
}

#[test]
fn test_shared_object_array_elements_stay_shared() {
    let main = item_is_left(item_is_left(shared_child(), 0), 1).emit(Opcode::Rtrn);

    let runtime = runtime(classes(main), RuntimeConfig::default());
    assert_eq!(runtime.run().unwrap(), vec![1, 1]);
}

#[test]
fn test_long_list_round_trips() {
    // head = Node(i, head) for i in 0..LENGTH, so values descend from the copy
    const LENGTH: i64 = 100_000;
    let main = MethodBuilder::new("Main:,")
        .local(ParamType::Object)
        .local(ParamType::Object)
        .local(ParamType::Object)
        .local(ParamType::Int)
        .local(ParamType::Object)
        .label(1)
        .emit_operand(Opcode::NewObjInst, 2)
        .emit_var(Opcode::StorLoclIntVar, 4, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 4, LOCL)
        .emit_var(Opcode::StorIntVar, 0, INST)
        .emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 4, LOCL)
        .emit_var(Opcode::StorIntVar, 1, INST)
        .emit_var(Opcode::LoadLoclIntVar, 4, LOCL)
        .emit_var(Opcode::StorLoclIntVar, 0, LOCL)
        .emit_operand(Opcode::LoadIntLit, 1)
        .emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
        .emit(Opcode::AddInt)
        .emit_var(Opcode::StorLoclIntVar, 3, LOCL)
        .emit_operand(Opcode::LoadIntLit, LENGTH)
        .emit_var(Opcode::LoadLoclIntVar, 3, LOCL)
        .emit(Opcode::LesInt)
        .jump_if(1, 1);
    let main = write_and_read(main)
        .emit_var(Opcode::LoadLoclIntVar, 2, LOCL)
        .emit(Opcode::Rtrn);

    let runtime = runtime(classes(main), RuntimeConfig::default());
    let mut node: Word = runtime.run().unwrap()[0];
    let mut expected = LENGTH as Word;
    while node != 0 {
        expected -= 1;
        let block = runtime.memory().get(node).unwrap();
        assert_eq!(block.words().load(1).unwrap(), expected);
        node = block.words().load(0).unwrap();
    }
    assert_eq!(expected, 0);
}

#[test]
fn test_float_round_trips() {
    let main = MethodBuilder::new("Main:,")
        .local(ParamType::Object)
        .emit_operand(Opcode::NewObjInst, 1)
        .emit_var(Opcode::StorLoclIntVar, 0, LOCL)
        .emit_float(2.5)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .call(1, 2)
        .emit_operand(Opcode::LoadIntLit, 0)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_var(Opcode::StorIntVar, 1, INST)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .call(1, 3)
        .emit_float(4.0)
        .emit(Opcode::MulFloat)
        .emit(Opcode::F2I)
        .emit(Opcode::Rtrn);

    let runtime = runtime(classes(main), RuntimeConfig::default());
    assert_eq!(runtime.run().unwrap(), vec![10]);
}
