//! Tests for Opcode, TrapId, ParamType and MemoryContext numbering

use bytecode_system::{declaration_layout, declaration_words, MemoryContext, Opcode, ParamType, TrapId};

#[test]
fn test_opcode_codes_are_contiguous() {
    for (index, opcode) in Opcode::ALL.iter().enumerate() {
        assert_eq!(opcode.code(), index as i32);
        assert_eq!(Opcode::try_from(index as i32), Ok(*opcode));
    }
}

#[test]
fn test_opcode_anchor_values() {
    assert_eq!(Opcode::LoadIntLit.code(), 0);
    assert_eq!(Opcode::StorIntVar.code(), 10);
    assert_eq!(Opcode::LoadArySize.code(), 28);
    assert_eq!(Opcode::I2F.code(), 71);
    assert_eq!(Opcode::Jmp.code(), 79);
    assert_eq!(Opcode::Trap.code(), 94);
    assert_eq!(Opcode::EndStmts.code(), 115);
}

#[test]
fn test_opcode_mnemonic() {
    assert_eq!(Opcode::LoadClsInstIntVar.mnemonic(), "LOAD_CLS_INST_INT_VAR");
    assert_eq!(Opcode::DllFuncCall.to_string(), "DLL_FUNC_CALL");
}

#[test]
fn test_unsupported_opcodes() {
    assert!(Opcode::DllLoad.is_unsupported());
    assert!(Opcode::LibFuncDef.is_unsupported());
    assert!(!Opcode::Trap.is_unsupported());
}

#[test]
fn test_trap_anchor_values() {
    assert_eq!(TrapId::LoadClsInstId.code(), -4000);
    assert_eq!(TrapId::SysTime.code(), -3985);
    assert_eq!(TrapId::StdOutString.code(), -3954);
    assert_eq!(TrapId::SerlInt.code(), -3833);
    assert_eq!(TrapId::Exit.code(), -3806);
}

#[test]
fn test_param_type_codes() {
    assert_eq!(ParamType::Char.code(), -1500);
    assert_eq!(ParamType::Int.code(), -1499);
    assert_eq!(ParamType::Function.code(), -1491);
}

#[test]
fn test_param_type_references() {
    assert!(!ParamType::Int.is_reference());
    assert!(!ParamType::Float.is_reference());
    assert!(ParamType::CharArray.is_reference());
    assert!(ParamType::Function.is_reference());
}

#[test]
fn test_memory_context_roundtrip() {
    for ctx in [MemoryContext::Cls, MemoryContext::Inst, MemoryContext::Locl] {
        assert_eq!(MemoryContext::from_operand(ctx as i64), Some(ctx));
    }
    assert_eq!(MemoryContext::from_operand(0), None);
}

#[test]
fn test_declaration_words() {
    let decls = [ParamType::Float, ParamType::Object, ParamType::Function];
    assert_eq!(declaration_words(&decls), core_types::FLOAT_WORDS + 3);
    let layout = declaration_layout(&decls);
    assert_eq!(layout[1].0, core_types::FLOAT_WORDS);
}
