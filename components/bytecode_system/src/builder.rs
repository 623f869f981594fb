//! Assembling programs in code.
//!
//! The builders assign class ids and method ids in insertion order and
//! qualify each method name with its class name, so `MethodBuilder::new("Run:,")`
//! inside class `Job` becomes `Job:Run:,`.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, ProgramBuilder};
//!
//! let mut builder = ProgramBuilder::new();
//! let main = builder.add_class(
//!     ClassBuilder::new("Hello").method(
//!         MethodBuilder::new("Main:o.System.String*,")
//!             .emit_operand(Opcode::LoadIntLit, 42)
//!             .emit(Opcode::PopInt)
//!             .emit(Opcode::Rtrn),
//!     ),
//! );
//! builder.entry(main, 0);
//!
//! let program = builder.build().unwrap();
//! assert_eq!(program.method(main, 0).unwrap().name(), "Hello:Main:o.System.String*,");
//! ```

use crate::instruction::Instruction;
use crate::loader::LoadError;
use crate::opcode::{MemoryContext, Opcode, ParamType};
use crate::program::{Class, Method, MethodRef, Program};

/// Builds one method.
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    is_virtual: bool,
    params: usize,
    declarations: Vec<ParamType>,
    instructions: Vec<Instruction>,
}

impl MethodBuilder {
    /// Starts a method; `name` is everything after `Class:`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_virtual: false,
            params: 0,
            declarations: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// Marks the method as dynamically bound
    pub fn virtual_method(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Declares a parameter (parameters precede plain locals)
    pub fn param(mut self, kind: ParamType) -> Self {
        self.declarations.insert(self.params, kind);
        self.params += 1;
        self
    }

    /// Declares a local
    pub fn local(mut self, kind: ParamType) -> Self {
        self.declarations.push(kind);
        self
    }

    /// Appends an instruction without operands
    pub fn emit(self, opcode: Opcode) -> Self {
        self.push(Instruction::new(opcode))
    }

    /// Appends an instruction with one operand
    pub fn emit_operand(self, opcode: Opcode, operand: i64) -> Self {
        self.push(Instruction::with_operand(opcode, operand))
    }

    /// Appends an instruction with all integer operands
    pub fn emit_operands(self, opcode: Opcode, operand: i64, operand2: i64, operand3: i64) -> Self {
        self.push(Instruction::with_operands(opcode, operand, operand2, operand3))
    }

    /// Appends `LOAD_FLOAT_LIT value`
    pub fn emit_float(self, value: f64) -> Self {
        self.push(Instruction::with_float(Opcode::LoadFloatLit, value))
    }

    /// Appends a variable access (`LOAD_*_VAR`, `STOR_*_VAR`, `COPY_*_VAR`)
    pub fn emit_var(self, opcode: Opcode, slot: i64, context: MemoryContext) -> Self {
        self.emit_operands(opcode, slot, context as i64, 0)
    }

    /// Appends a label definition
    pub fn label(self, id: i64) -> Self {
        self.emit_operand(Opcode::Lbl, id)
    }

    /// Appends an unconditional jump
    pub fn jump(self, label: i64) -> Self {
        self.emit_operands(Opcode::Jmp, label, -1, 0)
    }

    /// Appends a jump taken when the popped value equals `when`
    pub fn jump_if(self, label: i64, when: i64) -> Self {
        self.emit_operands(Opcode::Jmp, label, when, 0)
    }

    /// Appends a call to an interpreted method
    pub fn call(self, class_id: usize, method_id: usize) -> Self {
        self.emit_operands(Opcode::MthdCall, class_id as i64, method_id as i64, 0)
    }

    /// Appends `TRAP` for `trap`, pushing the id first
    pub fn trap(self, trap: crate::trap::TrapId, args: i64) -> Self {
        self.emit_operand(Opcode::LoadIntLit, trap.code() as i64)
            .emit_operand(Opcode::Trap, args)
    }

    fn push(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    fn finish(self, id: usize, class_id: usize, class_name: &str) -> Method {
        Method::new(
            id,
            class_id,
            format!("{}:{}", class_name, self.name),
            self.is_virtual,
            self.params,
            self.declarations,
            self.instructions,
        )
    }
}

/// Builds one class.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    parent: Option<usize>,
    interfaces: Vec<usize>,
    is_virtual: bool,
    class_declarations: Vec<ParamType>,
    instance_declarations: Vec<ParamType>,
    methods: Vec<MethodBuilder>,
}

impl ClassBuilder {
    /// Starts a class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            is_virtual: false,
            class_declarations: Vec::new(),
            instance_declarations: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Sets the parent class
    pub fn parent(mut self, id: usize) -> Self {
        self.parent = Some(id);
        self
    }

    /// Adds an implemented interface
    pub fn interface(mut self, id: usize) -> Self {
        self.interfaces.push(id);
        self
    }

    /// Marks the class abstract
    pub fn virtual_class(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Declares a static field
    pub fn static_field(mut self, kind: ParamType) -> Self {
        self.class_declarations.push(kind);
        self
    }

    /// Declares an instance field
    pub fn field(mut self, kind: ParamType) -> Self {
        self.instance_declarations.push(kind);
        self
    }

    /// Adds a method; ids follow insertion order
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    fn finish(self, id: usize) -> Class {
        let methods = self
            .methods
            .into_iter()
            .enumerate()
            .map(|(method_id, method)| method.finish(method_id, id, &self.name))
            .collect();
        Class::new(
            id,
            self.name,
            self.parent,
            self.interfaces,
            self.is_virtual,
            self.class_declarations,
            self.instance_declarations,
            methods,
        )
    }
}

/// Builds a whole program.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    classes: Vec<ClassBuilder>,
    char_strings: Vec<String>,
    int_strings: Vec<Vec<i64>>,
    float_strings: Vec<Vec<f64>>,
    init_method: Option<MethodRef>,
    entry_method: Option<MethodRef>,
}

impl ProgramBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class and returns its id
    pub fn add_class(&mut self, class: ClassBuilder) -> usize {
        self.classes.push(class);
        self.classes.len() - 1
    }

    /// Id the next added class will get
    pub fn next_class_id(&self) -> usize {
        self.classes.len()
    }

    /// Adds a pooled char string and returns its index
    pub fn add_char_string(&mut self, value: impl Into<String>) -> usize {
        self.char_strings.push(value.into());
        self.char_strings.len() - 1
    }

    /// Adds a pooled int array and returns its index
    pub fn add_int_string(&mut self, values: Vec<i64>) -> usize {
        self.int_strings.push(values);
        self.int_strings.len() - 1
    }

    /// Adds a pooled float array and returns its index
    pub fn add_float_string(&mut self, values: Vec<f64>) -> usize {
        self.float_strings.push(values);
        self.float_strings.len() - 1
    }

    /// Sets the static initialization method
    pub fn init(&mut self, class_id: usize, method_id: usize) -> &mut Self {
        self.init_method = Some(MethodRef::new(class_id, method_id));
        self
    }

    /// Sets the entry method
    pub fn entry(&mut self, class_id: usize, method_id: usize) -> &mut Self {
        self.entry_method = Some(MethodRef::new(class_id, method_id));
        self
    }

    /// Links and validates the program
    pub fn build(self) -> Result<Program, LoadError> {
        let entry = self.entry_method.ok_or(LoadError::DanglingMethod {
            class: usize::MAX,
            method: usize::MAX,
        })?;
        let classes = self
            .classes
            .into_iter()
            .enumerate()
            .map(|(id, class)| class.finish(id))
            .collect();
        let mut program = Program::new(
            classes,
            self.char_strings,
            self.int_strings,
            self.float_strings,
            self.init_method,
            entry,
        );
        program.link()?;
        Ok(program)
    }
}
