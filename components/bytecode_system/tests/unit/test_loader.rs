//! Tests for the program binary format

use bytecode_system::{
    ClassBuilder, LoadError, MethodBuilder, Opcode, ParamType, Program, ProgramBuilder, MAGIC,
};

fn program() -> Program {
    let mut builder = ProgramBuilder::new();
    let cls = builder.add_class(
        ClassBuilder::new("Counter")
            .field(ParamType::Int)
            .method(
                MethodBuilder::new("Main:,")
                    .local(ParamType::Int)
                    .label(0)
                    .emit_float(2.5)
                    .emit(Opcode::PopFloat)
                    .jump(1)
                    .label(1)
                    .emit(Opcode::Rtrn),
            ),
    );
    builder.entry(cls, 0);
    builder.build().unwrap()
}

#[test]
fn test_roundtrip_relinks() {
    let bytes = program().to_bytes().unwrap();
    let loaded = Program::from_bytes(&bytes).unwrap();
    let method = loaded.method(0, 0).unwrap();
    assert_eq!(method.label_index(1), Some(4));
    assert_eq!(method.local_words(), 1);
    assert_eq!(loaded.class_by_name("Counter").unwrap().instance_words(), 1);
    assert_eq!(method.instructions()[1].float_operand, 2.5);
}

#[test]
fn test_file_roundtrip() {
    let dir = std::env::temp_dir().join(format!("svmp-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("counter.svm");
    program().save(&path).unwrap();
    let loaded = Program::load(&path).unwrap();
    assert_eq!(loaded.entry_method().class_id, 0);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_rejects_empty_input() {
    assert!(matches!(Program::from_bytes(&[]), Err(LoadError::Truncated)));
}

#[test]
fn test_rejects_header_only() {
    let mut bytes = MAGIC.to_vec();
    bytes.push(bytecode_system::FORMAT_VERSION);
    assert!(matches!(Program::from_bytes(&bytes), Err(LoadError::Truncated)));
}

#[test]
fn test_rejects_foreign_file() {
    assert!(matches!(
        Program::from_bytes(b"\x7fELF\x02\x01\x01"),
        Err(LoadError::BadMagic)
    ));
}

#[test]
fn test_rejects_missing_file() {
    assert!(matches!(
        Program::load("/nonexistent/program.svm"),
        Err(LoadError::Io(_))
    ));
}

#[test]
fn test_rejects_unknown_opcode() {
    let mut bytes = program().to_bytes().unwrap();
    let lbl = (Opcode::Lbl.code()).to_le_bytes();
    let pos = bytes
        .windows(4)
        .rposition(|w| w == lbl)
        .unwrap();
    bytes[pos..pos + 4].copy_from_slice(&9999i32.to_le_bytes());
    assert!(Program::from_bytes(&bytes).is_err());
}
