//! Tests for Instruction

use bytecode_system::{Instruction, Opcode};

#[test]
fn test_instruction_operands() {
    let inst = Instruction::with_operands(Opcode::MthdCall, 2, 5, 1);
    assert_eq!(inst.operand, 2);
    assert_eq!(inst.operand2, 5);
    assert_eq!(inst.operand3, 1);
}

#[test]
fn test_float_instruction() {
    let inst = Instruction::with_float(Opcode::LoadFloatLit, 1.25);
    assert_eq!(inst.opcode, Opcode::LoadFloatLit);
    assert_eq!(inst.float_operand, 1.25);
}

#[test]
fn test_equality_ignores_cache() {
    let a = Instruction::with_operands(Opcode::Jmp, 1, -1, 0);
    let b = a.clone();
    a.jump_target(|_| Some(0));
    assert_eq!(a, b);
    assert!(b.cached_target().is_none());
}

#[test]
fn test_cached_target_matches_fresh_lookup() {
    let labels = [(7i64, 12usize)];
    let lookup = |label: i64| labels.iter().find(|(l, _)| *l == label).map(|(_, i)| *i);
    let inst = Instruction::with_operands(Opcode::Jmp, 7, -1, 0);
    let first = inst.jump_target(lookup);
    let second = inst.jump_target(|_| None);
    assert_eq!(first, Some(13));
    assert_eq!(second, first);
    assert_eq!(second, lookup(7).map(|i| i + 1));
}
