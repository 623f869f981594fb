//! Shared fixtures for the collector tests

use std::sync::Arc;

use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, ParamType, Program, ProgramBuilder};
use core_types::Word;
use memory_manager::{FrameRoots, GcConfig, MemoryManager, Mutator, ThreadRoots};
use parking_lot::{Mutex, MutexGuard};

/// Class 0: `Node { next: Object, value: Int }` with static `head: Object`.
/// Method 0 of class 0 declares `(o, i, f)` locals.
pub fn program() -> Arc<Program> {
    let mut builder = ProgramBuilder::new();
    let node = builder.add_class(
        ClassBuilder::new("Node")
            .static_field(ParamType::Object)
            .field(ParamType::Object)
            .field(ParamType::Int)
            .method(
                MethodBuilder::new("Walk:o.Node,")
                    .param(ParamType::Object)
                    .local(ParamType::Int)
                    .local(ParamType::Function)
                    .emit(Opcode::Rtrn),
            ),
    );
    builder.entry(node, 0);
    Arc::new(builder.build().unwrap())
}

pub fn manager(config: GcConfig) -> MemoryManager {
    MemoryManager::new(program(), config).unwrap()
}

#[derive(Default)]
pub struct ThreadState {
    pub stack: Vec<Word>,
    pub frames: Vec<(usize, usize, Vec<Word>)>,
}

/// A registered thread whose state the test edits between cycles.
pub struct TestThread {
    pub id: u64,
    pub state: Mutex<ThreadState>,
}

impl TestThread {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(ThreadState::default()),
        })
    }
}

struct Parked<'a> {
    id: u64,
    state: MutexGuard<'a, ThreadState>,
}

impl ThreadRoots for Parked<'_> {
    fn mutator_id(&self) -> u64 {
        self.id
    }

    fn operand_stack(&self) -> &[Word] {
        &self.state.stack
    }

    fn for_each_frame(&self, visit: &mut dyn FnMut(FrameRoots<'_>)) {
        for (class_id, method_id, locals) in &self.state.frames {
            visit(FrameRoots {
                class_id: *class_id,
                method_id: *method_id,
                locals,
            });
        }
    }
}

impl Mutator for TestThread {
    fn id(&self) -> u64 {
        self.id
    }

    fn park(&self) -> Box<dyn ThreadRoots + '_> {
        Box::new(Parked {
            id: self.id,
            state: self.state.lock(),
        })
    }
}
