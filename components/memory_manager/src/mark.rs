//! The mark phase.
//!
//! Each root group gets its own [`MarkTask`] with a private gray stack, and
//! the groups run on scoped threads. Tasks share the mark bits and the marked
//! list: whichever task sets a block's bit records and scans it, so every
//! reachable block is scanned exactly once per cycle.
//!
//! Operand stacks, frame slot 0 and debug roots are scanned conservatively:
//! any word that decodes to a live handle keeps its block. Frame locals,
//! object fields and statics are scanned by their declared types.
//!
//! Programs build object arrays with `NEW_INT_ARY`, so an int array block
//! may hold handles. Its elements are followed unless the slot it was
//! reached through declares it an int array.

use std::panic;
use std::sync::Arc;

use crossbeam_deque::Worker;
use parking_lot::Mutex;

use bytecode_system::{declaration_layout, ParamType, Program};
use core_types::Word;

use crate::block::{BlockKind, Words};
use crate::heap::SlotTable;
use crate::roots::{FrameRoots, JitRoot, ThreadRoots};

/// Everything the collector scans from, gathered while the world is stopped.
pub(crate) struct RootSet<'a> {
    pub statics: &'a [Word],
    pub threads: Vec<&'a dyn ThreadRoots>,
    pub jit: &'a [JitRoot],
    pub debug: &'a [Arc<Words>],
}

/// Shared, read-only view used by all tasks of one cycle.
pub(crate) struct Marker<'a> {
    program: &'a Program,
    table: &'a SlotTable,
    marked: Mutex<Vec<Word>>,
}

impl<'a> Marker<'a> {
    pub(crate) fn new(program: &'a Program, table: &'a SlotTable) -> Self {
        Self {
            program,
            table,
            marked: Mutex::new(Vec::new()),
        }
    }

    fn task(&self) -> MarkTask<'_, 'a> {
        MarkTask {
            marker: self,
            gray: Worker::new_lifo(),
        }
    }

    /// Marks everything reachable from `roots`; returns the handles marked.
    pub(crate) fn run(self, roots: &RootSet<'_>) -> Vec<Word> {
        let marker = &self;
        let outcome = crossbeam::thread::scope(|scope| {
            let mut handles = Vec::new();

            handles.push(scope.spawn(|_| {
                let mut task = marker.task();
                for handle in roots.statics {
                    task.mark_word(*handle);
                }
                task.finish()
            }));

            for thread in &roots.threads {
                let thread = *thread;
                handles.push(scope.spawn(move |_| {
                    let mut task = marker.task();
                    task.scan_thread(thread);
                    task.finish()
                }));
            }

            if !roots.jit.is_empty() {
                handles.push(scope.spawn(|_| {
                    let mut task = marker.task();
                    for root in roots.jit {
                        task.scan_jit_root(root);
                    }
                    task.finish()
                }));
            }

            let mut local = marker.task();
            for words in roots.debug {
                local.scan_conservative(&words.to_vec());
            }
            local.finish();

            for handle in handles {
                if let Err(payload) = handle.join() {
                    panic::resume_unwind(payload);
                }
            }
        });

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
        self.marked.into_inner()
    }
}

/// How a block was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    /// Untyped word, object reference or object array element
    Reference,
    /// Slot declared as an int array; its elements are scalars
    Scalars,
}

/// One unit of marking work with its own gray stack.
pub(crate) struct MarkTask<'m, 'a> {
    marker: &'m Marker<'a>,
    gray: Worker<(Word, Reach)>,
}

impl MarkTask<'_, '_> {
    /// Marks `word` if it is a live handle and not yet marked.
    fn mark_word(&mut self, word: Word) {
        self.mark_as(word, Reach::Reference);
    }

    fn mark_as(&mut self, word: Word, reach: Reach) {
        if let Some(block) = self.marker.table.lookup(word) {
            if block.try_mark() {
                self.marker.marked.lock().push(word);
                self.gray.push((word, reach));
            }
        }
    }

    fn scan_conservative(&mut self, words: &[Word]) {
        for word in words {
            self.mark_word(*word);
        }
    }

    /// Marks the typed slots of `declarations`, laid out from `base`.
    fn scan_declared(
        &mut self,
        declarations: &[ParamType],
        base: usize,
        read: impl Fn(usize) -> Option<Word>,
    ) {
        for (offset, kind) in declaration_layout(declarations) {
            let slot = base + offset;
            let (reference, reach) = match kind {
                ParamType::Function => (read(slot + 1), Reach::Reference),
                ParamType::IntArray => (read(slot), Reach::Scalars),
                kind if kind.is_reference() => (read(slot), Reach::Reference),
                _ => (None, Reach::Reference),
            };
            if let Some(word) = reference {
                self.mark_as(word, reach);
            }
        }
    }

    fn scan_frame(&mut self, frame: FrameRoots<'_>) {
        if let Some(receiver) = frame.locals.first() {
            self.mark_word(*receiver);
        }
        match self.marker.program.method(frame.class_id, frame.method_id) {
            Some(method) => {
                let locals = frame.locals;
                self.scan_declared(method.declarations(), 1, |slot| locals.get(slot).copied());
            }
            None => self.scan_conservative(frame.locals),
        }
    }

    fn scan_thread(&mut self, thread: &dyn ThreadRoots) {
        self.scan_conservative(thread.operand_stack());
        thread.for_each_frame(&mut |frame| self.scan_frame(frame));
    }

    fn scan_jit_root(&mut self, root: &JitRoot) {
        self.mark_word(root.self_ref);
        let locals = root.locals.to_vec();
        let size = root.size.min(locals.len());
        self.scan_frame(FrameRoots {
            class_id: root.class_id,
            method_id: root.method_id,
            locals: &locals[..size],
        });
    }

    /// Scans one gray block's outgoing references.
    fn scan_block(&mut self, handle: Word, reach: Reach) {
        let table = self.marker.table;
        let Some(block) = table.lookup(handle) else {
            return;
        };
        let words = block.words();
        match block.kind() {
            BlockKind::Object { class_id } => {
                if let Some(class) = self.marker.program.class(class_id) {
                    self.scan_declared(class.instance_declarations(), 0, |slot| words.get(slot));
                }
            }
            BlockKind::Statics { class_id } => {
                if let Some(class) = self.marker.program.class(class_id) {
                    self.scan_declared(class.class_declarations(), 0, |slot| words.get(slot));
                }
            }
            BlockKind::IntArray if reach == Reach::Scalars => {}
            BlockKind::IntArray | BlockKind::ObjectArray => {
                for index in block.array_data_offset()..words.len() {
                    if let Some(word) = words.get(index) {
                        self.mark_word(word);
                    }
                }
            }
            BlockKind::Function => {
                if let Some(word) = words.get(1) {
                    self.mark_word(word);
                }
            }
            BlockKind::ByteArray | BlockKind::CharArray | BlockKind::FloatArray => {}
        }
    }

    /// Drains the gray stack.
    fn finish(mut self) {
        while let Some((handle, reach)) = self.gray.pop() {
            self.scan_block(handle, reach);
        }
    }
}
