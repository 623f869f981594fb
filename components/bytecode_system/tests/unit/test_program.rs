//! Tests for the program model and builders

use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, ParamType, ProgramBuilder};

fn two_level_program() -> bytecode_system::Program {
    let mut builder = ProgramBuilder::new();
    let string = builder.add_class(
        ClassBuilder::new("System.String")
            .field(ParamType::CharArray)
            .field(ParamType::Int),
    );
    let base = builder.add_class(
        ClassBuilder::new("Shape")
            .virtual_class()
            .static_field(ParamType::Int)
            .static_field(ParamType::Object)
            .method(MethodBuilder::new("Area:,").virtual_method()),
    );
    let square = builder.add_class(
        ClassBuilder::new("Square")
            .parent(base)
            .field(ParamType::Float)
            .method(MethodBuilder::new("Area:,").emit(Opcode::Rtrn)),
    );
    builder.add_char_string("square");
    builder.add_int_string(vec![1, 2, 3]);
    builder.add_float_string(vec![0.5]);
    builder.entry(square, 0);
    let _ = string;
    builder.build().unwrap()
}

#[test]
fn test_class_lookup() {
    let program = two_level_program();
    let square = program.class_by_name("Square").unwrap();
    assert_eq!(square.parent_id(), Some(1));
    assert_eq!(program.class(square.id()).unwrap().name(), "Square");
    assert!(program.class_by_name("Circle").is_none());
    assert!(program.class(99).is_none());
}

#[test]
fn test_memory_sizes() {
    let program = two_level_program();
    let shape = program.class_by_name("Shape").unwrap();
    assert_eq!(shape.static_words(), 2);
    let square = program.class_by_name("Square").unwrap();
    assert_eq!(square.instance_words(), core_types::FLOAT_WORDS);
}

#[test]
fn test_string_class() {
    let program = two_level_program();
    assert_eq!(program.string_class().map(|c| c.id()), Some(0));
}

#[test]
fn test_pools() {
    let program = two_level_program();
    assert_eq!(program.char_string(0), Some("square"));
    assert_eq!(program.int_string(0), Some(&[1i64, 2, 3][..]));
    assert_eq!(program.float_string(0), Some(&[0.5f64][..]));
    assert_eq!(program.char_string(1), None);
}

#[test]
fn test_virtual_flag() {
    let program = two_level_program();
    assert!(program.method(1, 0).unwrap().is_virtual());
    assert!(!program.method(2, 0).unwrap().is_virtual());
    assert!(program.class(1).unwrap().is_virtual());
}

#[test]
fn test_compile_lock_is_exclusive() {
    let program = two_level_program();
    let method = program.method(2, 0).unwrap();
    let guard = method.try_compile_lock();
    assert!(guard.is_some());
    assert!(method.try_compile_lock().is_none());
    drop(guard);
    assert!(method.try_compile_lock().is_some());
}

#[test]
fn test_failed_compile_is_remembered() {
    let program = two_level_program();
    let method = program.method(2, 0).unwrap();
    assert!(method.attach_native(None));
    assert!(method.compile_attempted());
    assert!(method.native_code().is_none());
}
