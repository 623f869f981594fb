//! Contract compliance tests for bytecode_system
//! Pins the surface the interpreter and memory manager rely on.

use bytecode_system::{
    ClassBuilder, Instruction, MethodBuilder, MethodRef, Opcode, ParamType, Program,
    ProgramBuilder, TrapId, STRING_CLASS_NAME,
};

/// Program is shared across interpreter threads
#[test]
fn test_contract_program_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Program>();
    assert_send_sync::<Instruction>();
}

/// Trap ids convert to and from their stable integers
#[test]
fn test_contract_trap_conversion() {
    for trap in TrapId::ALL {
        assert_eq!(TrapId::try_from(trap.code()), Ok(*trap));
    }
}

/// Method names are qualified with the class name
#[test]
fn test_contract_method_name_qualified() {
    let mut builder = ProgramBuilder::new();
    let cls = builder.add_class(
        ClassBuilder::new(STRING_CLASS_NAME)
            .field(ParamType::CharArray)
            .method(MethodBuilder::new("Size:,").emit(Opcode::Rtrn)),
    );
    builder.entry(cls, 0);
    let program = builder.build().unwrap();
    assert_eq!(
        program.method_ref(MethodRef::new(cls, 0)).unwrap().name(),
        "System.String:Size:,"
    );
}

/// Init method is optional but validated when present
#[test]
fn test_contract_init_validated() {
    let mut builder = ProgramBuilder::new();
    let cls = builder.add_class(
        ClassBuilder::new("A").method(MethodBuilder::new("f:,").emit(Opcode::Rtrn)),
    );
    builder.entry(cls, 0).init(cls, 5);
    assert!(builder.build().is_err());
}
