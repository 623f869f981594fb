//! In-memory program model.
//!
//! A [`Program`] is built once (by the loader or a [`crate::ProgramBuilder`]),
//! linked, and then shared read-only by every interpreter thread. The only
//! state that changes after linking is write-once: cached jump targets on
//! instructions and native code attached to methods.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;
use crate::loader::LoadError;
use crate::opcode::{declaration_words, Opcode, ParamType};

/// Handle to compiled native code produced by a JIT executor.
pub type NativeCode = Arc<dyn Any + Send + Sync>;

/// Name of the class whose instances represent strings.
pub const STRING_CLASS_NAME: &str = "System.String";

/// Identifies a method by class and method id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Owning class id
    pub class_id: usize,
    /// Method id within the class
    pub method_id: usize,
}

impl MethodRef {
    /// Create a method reference
    pub fn new(class_id: usize, method_id: usize) -> Self {
        Self {
            class_id,
            method_id,
        }
    }
}

/// A method: instructions, typed locals and lazily attached native code.
#[derive(Debug, Serialize, Deserialize)]
pub struct Method {
    id: usize,
    class_id: usize,
    name: String,
    is_virtual: bool,
    param_count: usize,
    declarations: Vec<ParamType>,
    instructions: Vec<Instruction>,
    #[serde(skip)]
    labels: HashMap<i64, usize>,
    #[serde(skip)]
    local_words: usize,
    #[serde(skip)]
    native: OnceLock<Option<NativeCode>>,
    #[serde(skip)]
    compile_lock: Mutex<()>,
}

impl Method {
    pub(crate) fn new(
        id: usize,
        class_id: usize,
        name: String,
        is_virtual: bool,
        param_count: usize,
        declarations: Vec<ParamType>,
        instructions: Vec<Instruction>,
    ) -> Self {
        Self {
            id,
            class_id,
            name,
            is_virtual,
            param_count,
            declarations,
            instructions,
            labels: HashMap::new(),
            local_words: 0,
            native: OnceLock::new(),
            compile_lock: Mutex::new(()),
        }
    }

    /// Method id within its class
    pub fn id(&self) -> usize {
        self.id
    }

    /// Id of the owning class
    pub fn class_id(&self) -> usize {
        self.class_id
    }

    /// Qualified name `Class:method:signature`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The part of the qualified name after the class, starting at the first ':'.
    pub fn name_suffix(&self) -> &str {
        self.name.find(':').map_or("", |pos| &self.name[pos..])
    }

    /// Returns true if calls must be bound against the receiver's class.
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Number of declared parameters
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Typed local declarations (parameters first)
    pub fn declarations(&self) -> &[ParamType] {
        &self.declarations
    }

    /// Instruction array
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction at `index`
    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Words of local memory, not counting the self slot
    pub fn local_words(&self) -> usize {
        self.local_words
    }

    /// Frame size: locals plus the self slot
    pub fn frame_words(&self) -> usize {
        self.local_words + 1
    }

    /// Index of the `LBL` instruction for `label`
    pub fn label_index(&self, label: i64) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    /// Native code attached by a JIT executor, if compilation succeeded.
    pub fn native_code(&self) -> Option<&NativeCode> {
        self.native.get().and_then(|code| code.as_ref())
    }

    /// Returns true once a compile attempt finished, successful or not.
    pub fn compile_attempted(&self) -> bool {
        self.native.get().is_some()
    }

    /// Records the outcome of compiling this method.
    ///
    /// Only the first call has an effect; `None` records a failed compile so
    /// the method is not retried.
    ///
    /// # Returns
    ///
    /// `true` if this call stored the outcome.
    pub fn attach_native(&self, code: Option<NativeCode>) -> bool {
        self.native.set(code).is_ok()
    }

    /// Takes the per-method compile lock without blocking.
    pub fn try_compile_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.compile_lock.try_lock()
    }

    fn link(&mut self) -> Result<(), LoadError> {
        self.local_words = declaration_words(&self.declarations);
        self.labels.clear();
        for (index, instr) in self.instructions.iter().enumerate() {
            if instr.opcode == Opcode::Lbl && self.labels.insert(instr.operand, index).is_some() {
                return Err(LoadError::DuplicateLabel {
                    method: self.name.clone(),
                    label: instr.operand,
                });
            }
        }
        Ok(())
    }
}

/// A class: typed field tables, methods and its place in the hierarchy.
#[derive(Debug, Serialize, Deserialize)]
pub struct Class {
    id: usize,
    name: String,
    parent_id: Option<usize>,
    interface_ids: Vec<usize>,
    is_virtual: bool,
    class_declarations: Vec<ParamType>,
    instance_declarations: Vec<ParamType>,
    methods: Vec<Method>,
    #[serde(skip)]
    method_names: HashMap<String, usize>,
    #[serde(skip)]
    static_words: usize,
    #[serde(skip)]
    instance_words: usize,
}

impl Class {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        name: String,
        parent_id: Option<usize>,
        interface_ids: Vec<usize>,
        is_virtual: bool,
        class_declarations: Vec<ParamType>,
        instance_declarations: Vec<ParamType>,
        methods: Vec<Method>,
    ) -> Self {
        Self {
            id,
            name,
            parent_id,
            interface_ids,
            is_virtual,
            class_declarations,
            instance_declarations,
            methods,
            method_names: HashMap::new(),
            static_words: 0,
            instance_words: 0,
        }
    }

    /// Class id
    pub fn id(&self) -> usize {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent class id
    pub fn parent_id(&self) -> Option<usize> {
        self.parent_id
    }

    /// Ids of the interfaces this class declares
    pub fn interface_ids(&self) -> &[usize] {
        &self.interface_ids
    }

    /// Returns true for abstract classes
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Static field declarations
    pub fn class_declarations(&self) -> &[ParamType] {
        &self.class_declarations
    }

    /// Instance field declarations
    pub fn instance_declarations(&self) -> &[ParamType] {
        &self.instance_declarations
    }

    /// Words of static memory
    pub fn static_words(&self) -> usize {
        self.static_words
    }

    /// Words of instance memory
    pub fn instance_words(&self) -> usize {
        self.instance_words
    }

    /// All methods, indexed by id
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Method by id
    pub fn method(&self, id: usize) -> Option<&Method> {
        self.methods.get(id)
    }

    /// Method by qualified name
    pub fn method_by_name(&self, name: &str) -> Option<&Method> {
        self.method_names.get(name).and_then(|id| self.methods.get(*id))
    }

    fn link(&mut self) -> Result<(), LoadError> {
        self.static_words = declaration_words(&self.class_declarations);
        self.instance_words = declaration_words(&self.instance_declarations);
        self.method_names.clear();
        for (index, method) in self.methods.iter_mut().enumerate() {
            if method.id != index || method.class_id != self.id {
                return Err(LoadError::DanglingMethod {
                    class: self.id,
                    method: method.id,
                });
            }
            method.link()?;
            self.method_names.insert(method.name.clone(), index);
        }
        Ok(())
    }
}

/// A loaded, linked program.
#[derive(Debug, Serialize, Deserialize)]
pub struct Program {
    classes: Vec<Class>,
    char_strings: Vec<String>,
    int_strings: Vec<Vec<i64>>,
    float_strings: Vec<Vec<f64>>,
    init_method: Option<MethodRef>,
    entry_method: MethodRef,
    #[serde(skip)]
    class_names: HashMap<String, usize>,
}

impl Program {
    pub(crate) fn new(
        classes: Vec<Class>,
        char_strings: Vec<String>,
        int_strings: Vec<Vec<i64>>,
        float_strings: Vec<Vec<f64>>,
        init_method: Option<MethodRef>,
        entry_method: MethodRef,
    ) -> Self {
        Self {
            classes,
            char_strings,
            int_strings,
            float_strings,
            init_method,
            entry_method,
            class_names: HashMap::new(),
        }
    }

    /// All classes, indexed by id
    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// Class by id
    pub fn class(&self, id: usize) -> Option<&Class> {
        self.classes.get(id)
    }

    /// Class by name
    pub fn class_by_name(&self, name: &str) -> Option<&Class> {
        self.class_names.get(name).and_then(|id| self.classes.get(*id))
    }

    /// Method by class and method id
    pub fn method(&self, class_id: usize, method_id: usize) -> Option<&Method> {
        self.class(class_id).and_then(|cls| cls.method(method_id))
    }

    /// Method referenced by `target`
    pub fn method_ref(&self, target: MethodRef) -> Option<&Method> {
        self.method(target.class_id, target.method_id)
    }

    /// Parent of `class_id` in the hierarchy
    pub fn parent_of(&self, class_id: usize) -> Option<usize> {
        self.class(class_id).and_then(|cls| cls.parent_id)
    }

    /// Checks whether `class_id` is `target_id`, derives from it, or
    /// implements it as an interface somewhere along its parent chain.
    pub fn is_a(&self, class_id: usize, target_id: usize) -> bool {
        let mut current = Some(class_id);
        while let Some(id) = current {
            if id == target_id {
                return true;
            }
            current = self.parent_of(id);
        }

        let mut current = Some(class_id);
        while let Some(id) = current {
            let Some(cls) = self.class(id) else {
                break;
            };
            if cls.interface_ids.contains(&target_id) {
                return true;
            }
            current = cls.parent_id;
        }
        false
    }

    /// The string class, if the program defines one
    pub fn string_class(&self) -> Option<&Class> {
        self.class_by_name(STRING_CLASS_NAME)
    }

    /// Pooled character string
    pub fn char_string(&self, index: usize) -> Option<&str> {
        self.char_strings.get(index).map(String::as_str)
    }

    /// Pooled integer array
    pub fn int_string(&self, index: usize) -> Option<&[i64]> {
        self.int_strings.get(index).map(Vec::as_slice)
    }

    /// Pooled float array
    pub fn float_string(&self, index: usize) -> Option<&[f64]> {
        self.float_strings.get(index).map(Vec::as_slice)
    }

    /// Static initialization method, run before the entry method
    pub fn init_method(&self) -> Option<MethodRef> {
        self.init_method
    }

    /// Program entry method
    pub fn entry_method(&self) -> MethodRef {
        self.entry_method
    }

    /// Rebuilds name maps and memory sizes, and validates cross references.
    pub fn link(&mut self) -> Result<(), LoadError> {
        self.class_names.clear();
        let count = self.classes.len();
        for (index, cls) in self.classes.iter_mut().enumerate() {
            if cls.id != index {
                return Err(LoadError::DanglingClass(cls.id));
            }
            if let Some(parent) = cls.parent_id {
                if parent >= count {
                    return Err(LoadError::DanglingClass(parent));
                }
            }
            if let Some(bad) = cls.interface_ids.iter().find(|id| **id >= count) {
                return Err(LoadError::DanglingClass(*bad));
            }
            cls.link()?;
            self.class_names.insert(cls.name.clone(), index);
        }

        for id in 0..count {
            if self.has_cycle_from(id) {
                return Err(LoadError::CyclicHierarchy(id));
            }
        }

        let refs = self.init_method.iter().chain(std::iter::once(&self.entry_method));
        for target in refs {
            if self.method_ref(*target).is_none() {
                return Err(LoadError::DanglingMethod {
                    class: target.class_id,
                    method: target.method_id,
                });
            }
        }
        Ok(())
    }

    fn has_cycle_from(&self, start: usize) -> bool {
        let mut steps = 0;
        let mut current = self.parent_of(start);
        while let Some(id) = current {
            steps += 1;
            if id == start || steps > self.classes.len() {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }
}
