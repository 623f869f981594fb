//! The memory manager: allocation front end and stop-the-world collector.
//!
//! Allocation charges each block against a running byte total. When a
//! request would take the total past the threshold, the allocating thread
//! tries to become the collector first; if another thread already is, it
//! carries on allocating.
//!
//! A cycle parks every other registered mutator at an instruction boundary,
//! marks from all root categories in parallel, then sweeps unmarked blocks
//! back into the size-class pools. Parked threads stay parked until the sweep
//! has finished, so no thread ever observes a half-swept heap.

use std::sync::Arc;

use parking_lot::Mutex;

use bytecode_system::Program;
use core_types::{Fault, Word};

use crate::block::{block_bytes, ArrayKind, BlockKind, HeapBlock, Words, ARRAY_HEADER_WORDS};
use crate::config::{CycleReport, GcConfig, GcStats};
use crate::heap::Heap;
use crate::mark::{Marker, RootSet};
use crate::roots::{JitRoot, Mutator, ThreadRoots};

#[derive(Debug)]
struct Accounting {
    live_bytes: usize,
    threshold: usize,
    uncollected: u32,
    collected: u32,
}

/// Heap, roots and collector for one program run.
pub struct MemoryManager {
    /// Program whose declarations type the heap
    program: Arc<Program>,
    /// Collector tuning
    config: GcConfig,
    /// Allocated blocks
    heap: Heap,
    /// Static memory handle per class, indexed by class id
    statics: Vec<Word>,
    /// Byte total and threshold adaptation state
    accounting: Mutex<Accounting>,
    /// Held by the thread running a cycle
    collection: Mutex<()>,
    /// Registered VM threads
    mutators: Mutex<Vec<Arc<dyn Mutator>>>,
    /// Activations running as native code
    jit_roots: Mutex<Vec<JitRoot>>,
    /// Frames pinned by a debugger
    debug_roots: Mutex<Vec<Arc<Words>>>,
    /// Running totals
    stats: Mutex<GcStats>,
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("config", &self.config)
            .field("blocks", &self.heap.len())
            .field("live_bytes", &self.live_bytes())
            .finish()
    }
}

impl MemoryManager {
    /// Creates the heap for `program` and allocates every class's statics.
    ///
    /// # Arguments
    ///
    /// * `program` - The linked program
    /// * `config` - Collector tuning
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use bytecode_system::{ClassBuilder, MethodBuilder, Opcode, ParamType, ProgramBuilder};
    /// use memory_manager::{DetachedRoots, GcConfig, MemoryManager};
    ///
    /// let mut builder = ProgramBuilder::new();
    /// let cls = builder.add_class(
    ///     ClassBuilder::new("Counter")
    ///         .field(ParamType::Int)
    ///         .method(MethodBuilder::new("Main:,").emit(Opcode::Rtrn)),
    /// );
    /// builder.entry(cls, 0);
    /// let program = Arc::new(builder.build().unwrap());
    ///
    /// let memory = MemoryManager::new(program, GcConfig::default()).unwrap();
    /// let object = memory.allocate_object(cls, &DetachedRoots::new()).unwrap();
    /// assert!(memory.contains(object));
    /// ```
    pub fn new(program: Arc<Program>, config: GcConfig) -> Result<Self, Fault> {
        let heap = Heap::new();
        let mut statics = Vec::with_capacity(program.classes().len());
        let mut live_bytes = 0;
        for class in program.classes() {
            let allocation = heap.allocate(
                BlockKind::Statics {
                    class_id: class.id(),
                },
                class.static_words(),
            )?;
            live_bytes += allocation.bytes;
            statics.push(allocation.handle);
        }

        let stats = GcStats {
            allocations: statics.len() as u64,
            ..GcStats::default()
        };
        Ok(Self {
            accounting: Mutex::new(Accounting {
                live_bytes,
                threshold: config.threshold,
                uncollected: 0,
                collected: 0,
            }),
            program,
            config,
            heap,
            statics,
            collection: Mutex::new(()),
            mutators: Mutex::new(Vec::new()),
            jit_roots: Mutex::new(Vec::new()),
            debug_roots: Mutex::new(Vec::new()),
            stats: Mutex::new(stats),
        })
    }

    /// The program this heap belongs to.
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Collector configuration.
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Static memory of `class_id`.
    pub fn statics(&self, class_id: usize) -> Option<Word> {
        self.statics.get(class_id).copied()
    }

    /// Allocates a zeroed instance of `class_id`.
    pub fn allocate_object(
        &self,
        class_id: usize,
        current: &dyn ThreadRoots,
    ) -> Result<Word, Fault> {
        let class = self
            .program
            .class(class_id)
            .ok_or(Fault::UnknownClass(class_id as i64))?;
        self.allocate(BlockKind::Object { class_id }, class.instance_words(), current)
    }

    /// Allocates an array with one extent per dimension.
    ///
    /// The element count is the product of the extents. Char arrays get one
    /// extra element for the terminating NUL, which the count excludes.
    ///
    /// # Returns
    ///
    /// The array handle, or `Fault::OutOfMemory` when the size overflows.
    pub fn allocate_array(
        &self,
        kind: ArrayKind,
        extents: &[usize],
        current: &dyn ThreadRoots,
    ) -> Result<Word, Fault> {
        let block_kind = BlockKind::from(kind);
        let count = extents
            .iter()
            .try_fold(1usize, |acc, extent| acc.checked_mul(*extent))
            .ok_or(Fault::OutOfMemory)?;
        let slots = if kind == ArrayKind::Char {
            count.checked_add(1).ok_or(Fault::OutOfMemory)?
        } else {
            count
        };
        let payload = slots
            .checked_mul(block_kind.element_words())
            .and_then(|data| data.checked_add(ARRAY_HEADER_WORDS + extents.len()))
            .ok_or(Fault::OutOfMemory)?;

        let handle = self.allocate(block_kind, payload, current)?;
        let block = self.heap.get(handle)?;
        let words = block.words();
        words.store(0, count as Word)?;
        words.store(1, extents.len() as Word)?;
        for (dim, extent) in extents.iter().enumerate() {
            words.store(ARRAY_HEADER_WORDS + dim, *extent as Word)?;
        }
        Ok(handle)
    }

    /// Allocates a two-word function value holder.
    pub fn allocate_function(&self, current: &dyn ThreadRoots) -> Result<Word, Fault> {
        self.allocate(BlockKind::Function, 2, current)
    }

    fn allocate(
        &self,
        kind: BlockKind,
        payload: usize,
        current: &dyn ThreadRoots,
    ) -> Result<Word, Fault> {
        let bytes = block_bytes(payload).ok_or(Fault::OutOfMemory)?;
        if self.would_exceed(bytes) {
            self.collect_for(current, bytes);
        }
        let allocation = self.heap.allocate(kind, payload)?;
        self.accounting.lock().live_bytes += allocation.bytes;
        self.stats.lock().allocations += 1;
        Ok(allocation.handle)
    }

    fn would_exceed(&self, request: usize) -> bool {
        let accounting = self.accounting.lock();
        accounting.live_bytes.saturating_add(request) > accounting.threshold
    }

    /// Block behind `handle`.
    pub fn get(&self, handle: Word) -> Result<Arc<HeapBlock>, Fault> {
        self.heap.get(handle)
    }

    /// Returns true if `word` is a live handle.
    pub fn contains(&self, word: Word) -> bool {
        self.heap.contains(word)
    }

    /// Bytes allocated and not yet freed.
    pub fn live_bytes(&self) -> usize {
        self.accounting.lock().live_bytes
    }

    /// Current collection threshold.
    pub fn threshold(&self) -> usize {
        self.accounting.lock().threshold
    }

    /// Number of live blocks, statics included.
    pub fn allocated_count(&self) -> usize {
        self.heap.len()
    }

    /// Every live handle, in slot order.
    pub fn handles(&self) -> Vec<Word> {
        self.heap.handles()
    }

    /// Snapshot of the running totals.
    pub fn stats(&self) -> GcStats {
        let mut stats = self.stats.lock().clone();
        {
            let accounting = self.accounting.lock();
            stats.live_bytes = accounting.live_bytes;
            stats.threshold = accounting.threshold;
        }
        let pools = self.heap.pools();
        stats.pool_hits = pools.hits();
        stats.pool_misses = pools.misses();
        stats
    }

    /// Adds a thread to the root set.
    ///
    /// Must not be called while the caller holds its own thread state: the
    /// collector keeps the mutator list locked for a whole cycle.
    pub fn register_mutator(&self, mutator: Arc<dyn Mutator>) {
        self.mutators.lock().push(mutator);
    }

    /// Removes thread `id` from the root set.
    pub fn unregister_mutator(&self, id: u64) {
        self.mutators.lock().retain(|mutator| mutator.id() != id);
    }

    /// Number of registered threads.
    pub fn mutator_count(&self) -> usize {
        self.mutators.lock().len()
    }

    /// Pins the frame of a natively running method.
    ///
    /// # Arguments
    ///
    /// * `class_id`, `method_id` - The running method, whose declarations type `locals`
    /// * `self_ref` - Receiver of the activation
    /// * `locals` - Frame words shared with the native code
    /// * `size` - Number of valid words in `locals`
    pub fn register_jit_root(
        &self,
        class_id: usize,
        method_id: usize,
        self_ref: Word,
        locals: Arc<Words>,
        size: usize,
    ) {
        let mut root = JitRoot::new(class_id, method_id, self_ref, locals);
        root.size = size.min(root.size);
        self.jit_roots.lock().push(root);
    }

    /// Unpins the frame registered with `locals`.
    pub fn unregister_jit_root(&self, locals: &Arc<Words>) {
        let mut roots = self.jit_roots.lock();
        if let Some(index) = roots.iter().position(|root| Arc::ptr_eq(&root.locals, locals)) {
            roots.swap_remove(index);
        }
    }

    /// Pins a debugger-held frame; every word is treated as a possible handle.
    pub fn register_debug_root(&self, frame_words: Arc<Words>) {
        self.debug_roots.lock().push(frame_words);
    }

    /// Unpins a debugger-held frame.
    pub fn unregister_debug_root(&self, frame_words: &Arc<Words>) {
        let mut roots = self.debug_roots.lock();
        if let Some(index) = roots.iter().position(|root| Arc::ptr_eq(root, frame_words)) {
            roots.swap_remove(index);
        }
    }

    /// Runs a cycle if the threshold is still exceeded and no other thread is
    /// collecting.
    ///
    /// # Returns
    ///
    /// `None` when another thread holds the collection lock or a cycle that
    /// finished meanwhile already brought the total under the threshold.
    pub fn collect(&self, current: &dyn ThreadRoots) -> Option<CycleReport> {
        self.collect_for(current, 0)
    }

    fn collect_for(&self, current: &dyn ThreadRoots, request: usize) -> Option<CycleReport> {
        let Some(_guard) = self.collection.try_lock() else {
            self.stats.lock().skipped += 1;
            return None;
        };
        if !self.would_exceed(request) {
            return None;
        }
        Some(self.run_cycle(current))
    }

    /// Runs a cycle regardless of the threshold; `None` if one is already running.
    pub fn collect_now(&self, current: &dyn ThreadRoots) -> Option<CycleReport> {
        let Some(_guard) = self.collection.try_lock() else {
            self.stats.lock().skipped += 1;
            return None;
        };
        Some(self.run_cycle(current))
    }

    fn run_cycle(&self, current: &dyn ThreadRoots) -> CycleReport {
        let mutators = self.mutators.lock();
        let current_id = current.mutator_id();
        let parked: Vec<Box<dyn ThreadRoots + '_>> = mutators
            .iter()
            .filter(|mutator| mutator.id() != current_id)
            .map(|mutator| mutator.park())
            .collect();
        let jit = self.jit_roots.lock().clone();
        let debug = self.debug_roots.lock().clone();

        let marked = {
            let table = self.heap.begin_cycle();
            let mut threads: Vec<&dyn ThreadRoots> =
                parked.iter().map(|roots| roots.as_ref()).collect();
            threads.push(current);
            let roots = RootSet {
                statics: &self.statics,
                threads,
                jit: &jit,
                debug: &debug,
            };
            Marker::new(&self.program, &table).run(&roots).len()
        };

        let mut freed_bytes = 0;
        let mut freed = Vec::new();
        {
            let mut table = self.heap.write();
            table.retain(
                |block| block.clear_mark(),
                |block| {
                    freed_bytes += block.bytes();
                    freed.push(block);
                },
            );
            table.set_allocate_marked(false);
        }
        let freed_blocks = freed.len();
        self.recycle(freed);
        drop(parked);
        drop(mutators);

        self.finish_cycle(marked, freed_blocks, freed_bytes)
    }

    /// Returns swept buffers to their pools.
    fn recycle(&self, freed: Vec<Arc<HeapBlock>>) {
        let mut pools = self.heap.pools();
        for block in freed {
            let Some(class) = block.size_class() else {
                continue;
            };
            if let Ok(block) = Arc::try_unwrap(block) {
                pools.give(class, block.into_buffer());
            }
        }
    }

    fn finish_cycle(&self, marked: usize, freed_blocks: usize, freed_bytes: usize) -> CycleReport {
        let mut stats = self.stats.lock();
        let (live_bytes, threshold) = {
            let mut accounting = self.accounting.lock();
            accounting.live_bytes = accounting.live_bytes.saturating_sub(freed_bytes);
            if freed_bytes == 0 {
                accounting.collected = 0;
                accounting.uncollected += 1;
                if accounting.uncollected >= self.config.uncollected_limit {
                    accounting.uncollected = 0;
                    accounting.threshold = accounting.threshold.saturating_mul(2);
                    stats.threshold_raises += 1;
                }
            } else {
                accounting.uncollected = 0;
                accounting.collected += 1;
                if accounting.collected >= self.config.collected_limit {
                    accounting.collected = 0;
                    if accounting.threshold > self.config.baseline {
                        accounting.threshold = (accounting.threshold / 2).max(self.config.baseline);
                        stats.threshold_drops += 1;
                    }
                }
            }
            (accounting.live_bytes, accounting.threshold)
        };

        stats.cycles += 1;
        stats.bytes_freed += freed_bytes as u64;
        stats.blocks_freed += freed_blocks as u64;
        let report = CycleReport {
            cycle: stats.cycles,
            marked,
            freed_blocks,
            freed_bytes,
            live_bytes,
            threshold,
        };
        if self.config.trace {
            eprintln!(
                "gc: cycle={} live={} freed={} threshold={} marked={}",
                report.cycle, report.live_bytes, report.freed_bytes, report.threshold, report.marked
            );
        }
        report
    }
}
