//! The allocated-block table.
//!
//! Heap references are handles, `(slot + 1) << HANDLE_SHIFT`, so a handle is
//! never zero (Nil) and its low bits are clear. A word is a live reference
//! exactly when it decodes to an occupied slot; conservative scanning relies
//! on that membership test.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use core_types::{Fault, Word, NIL};

use crate::block::{block_bytes, BlockKind, HeapBlock, Words};
use crate::pool::{size_class_for, Pools};

/// Low bits that are zero in every handle.
pub const HANDLE_SHIFT: u32 = 4;

const MAX_SLOTS: usize = (isize::MAX as usize) >> HANDLE_SHIFT;

/// Slot storage behind the table lock.
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: Vec<Option<Arc<HeapBlock>>>,
    free: Vec<usize>,
    count: usize,
    allocate_marked: bool,
}

impl SlotTable {
    fn slot_of(word: Word) -> Option<usize> {
        if word <= NIL || word & ((1 << HANDLE_SHIFT) - 1) != 0 {
            return None;
        }
        Some(((word as usize) >> HANDLE_SHIFT) - 1)
    }

    fn handle_of(slot: usize) -> Word {
        ((slot + 1) << HANDLE_SHIFT) as Word
    }

    /// Block for `word`, if it is a live handle.
    pub fn lookup(&self, word: Word) -> Option<&Arc<HeapBlock>> {
        Self::slot_of(word)
            .and_then(|slot| self.slots.get(slot))
            .and_then(Option::as_ref)
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true when no block is allocated.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Live handles and blocks.
    pub fn iter(&self) -> impl Iterator<Item = (Word, &Arc<HeapBlock>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, block)| block.as_ref().map(|b| (Self::handle_of(slot), b)))
    }

    /// While set, new blocks are born marked so a running cycle keeps them.
    pub(crate) fn set_allocate_marked(&mut self, marked: bool) {
        self.allocate_marked = marked;
    }

    fn insert(&mut self, block: Arc<HeapBlock>) -> Result<Word, Fault> {
        if self.allocate_marked {
            block.try_mark();
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(block);
                slot
            }
            None => {
                if self.slots.len() >= MAX_SLOTS {
                    return Err(Fault::OutOfMemory);
                }
                self.slots.push(Some(block));
                self.slots.len() - 1
            }
        };
        self.count += 1;
        Ok(Self::handle_of(slot))
    }

    /// Removes every block `keep` rejects, handing each to `release`.
    pub(crate) fn retain(
        &mut self,
        mut keep: impl FnMut(&HeapBlock) -> bool,
        mut release: impl FnMut(Arc<HeapBlock>),
    ) {
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            let drop_it = matches!(entry, Some(block) if !keep(block));
            if drop_it {
                if let Some(block) = entry.take() {
                    self.free.push(slot);
                    self.count -= 1;
                    release(block);
                }
            }
        }
    }
}

/// Result of a heap allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Handle of the new block
    pub handle: Word,
    /// Bytes charged, header included
    pub bytes: usize,
    /// Whether a pooled buffer was reused
    pub pooled: bool,
}

/// Allocated blocks plus the buffer pools feeding them.
#[derive(Debug, Default)]
pub struct Heap {
    table: RwLock<SlotTable>,
    pools: Mutex<Pools>,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a zeroed block of `payload_words` words.
    pub fn allocate(&self, kind: BlockKind, payload_words: usize) -> Result<Allocation, Fault> {
        let bytes = block_bytes(payload_words).ok_or(Fault::OutOfMemory)?;
        let class = size_class_for(bytes);
        let (words, pooled) = match class {
            Some(class) => {
                let mut pools = self.pools.lock();
                let hits = pools.hits();
                let buffer = pools.take(class);
                let pooled = pools.hits() > hits;
                (Words::recycle(buffer, payload_words), pooled)
            }
            None => (Words::new(payload_words), false),
        };
        let block = Arc::new(HeapBlock::new(kind, class, bytes, words));
        let handle = self.table.write().insert(block)?;
        Ok(Allocation {
            handle,
            bytes,
            pooled,
        })
    }

    /// Block for `word`; Nil and unknown handles are a Nil dereference.
    pub fn get(&self, word: Word) -> Result<Arc<HeapBlock>, Fault> {
        self.table
            .read()
            .lookup(word)
            .cloned()
            .ok_or(Fault::NilDereference)
    }

    /// Membership test used by conservative scanning.
    pub fn contains(&self, word: Word) -> bool {
        self.table.read().lookup(word).is_some()
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true when nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live handles, in slot order.
    pub fn handles(&self) -> Vec<Word> {
        self.table.read().iter().map(|(handle, _)| handle).collect()
    }

    /// Shared view of the table for the mark phase.
    pub fn read(&self) -> RwLockReadGuard<'_, SlotTable> {
        self.table.read()
    }

    /// Starts a cycle: later allocations are born marked.
    pub(crate) fn begin_cycle(&self) -> RwLockReadGuard<'_, SlotTable> {
        let mut table = self.table.write();
        table.set_allocate_marked(true);
        RwLockWriteGuard::downgrade(table)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, SlotTable> {
        self.table.write()
    }

    /// Exclusive access to the pools.
    pub fn pools(&self) -> parking_lot::MutexGuard<'_, Pools> {
        self.pools.lock()
    }
}
