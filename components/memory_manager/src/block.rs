//! Heap blocks: a tagged allocation record plus a word payload.
//!
//! The header `{size_class, kind, mark}` is an ordinary struct next to the
//! payload, so nothing ever reaches it through pointer arithmetic. Payload
//! words are atomics because the collector reads them from its mark tasks
//! while the owning threads are parked.

use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::{Arc, OnceLock};

use core_types::{Fault, Word, FLOAT_WORDS, WORD_BYTES};

use crate::monitor::Monitor;

/// Words taken by the allocation record (size class, kind, mark).
pub const HEADER_WORDS: usize = 3;

/// Words before the extents in an array payload: element count and dimensions.
pub const ARRAY_HEADER_WORDS: usize = 2;

/// What a block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Instance of a class; fields follow its instance declarations
    Object {
        /// Class of the instance
        class_id: usize,
    },
    /// Static memory of a class; fields follow its static declarations
    Statics {
        /// Owning class
        class_id: usize,
    },
    /// Byte elements, one per word
    ByteArray,
    /// Char elements, one per word, NUL terminated
    CharArray,
    /// Integer elements
    IntArray,
    /// Float elements, `FLOAT_WORDS` each
    FloatArray,
    /// Object reference elements
    ObjectArray,
    /// Function value holder
    Function,
}

impl BlockKind {
    /// Returns true for the array kinds.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            BlockKind::ByteArray
                | BlockKind::CharArray
                | BlockKind::IntArray
                | BlockKind::FloatArray
                | BlockKind::ObjectArray
        )
    }

    /// Words one array element occupies.
    pub fn element_words(self) -> usize {
        match self {
            BlockKind::FloatArray => FLOAT_WORDS,
            _ => 1,
        }
    }

    /// Class of an object or statics block.
    pub fn class_id(self) -> Option<usize> {
        match self {
            BlockKind::Object { class_id } | BlockKind::Statics { class_id } => Some(class_id),
            _ => None,
        }
    }
}

/// Element kind requested by the array allocation instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// `NEW_BYTE_ARY`
    Byte,
    /// `NEW_CHAR_ARY`
    Char,
    /// `NEW_INT_ARY`
    Int,
    /// `NEW_FLOAT_ARY`
    Float,
    /// Arrays of object references
    Object,
}

impl From<ArrayKind> for BlockKind {
    fn from(kind: ArrayKind) -> Self {
        match kind {
            ArrayKind::Byte => BlockKind::ByteArray,
            ArrayKind::Char => BlockKind::CharArray,
            ArrayKind::Int => BlockKind::IntArray,
            ArrayKind::Float => BlockKind::FloatArray,
            ArrayKind::Object => BlockKind::ObjectArray,
        }
    }
}

/// A fixed-length run of atomic words.
#[derive(Debug)]
pub struct Words {
    cells: Box<[AtomicIsize]>,
    len: usize,
}

impl Words {
    /// Creates `len` zeroed words.
    pub fn new(len: usize) -> Self {
        Self {
            cells: fresh_buffer(len),
            len,
        }
    }

    /// Creates words holding a copy of `values`.
    pub fn from_slice(values: &[Word]) -> Self {
        let words = Self::new(values.len());
        for (cell, value) in words.cells.iter().zip(values) {
            cell.store(*value, Ordering::Relaxed);
        }
        words
    }

    /// Reuses `buffer`, zero-filling the first `len` words.
    pub(crate) fn recycle(buffer: Box<[AtomicIsize]>, len: usize) -> Self {
        for cell in &buffer[..len] {
            cell.store(0, Ordering::Relaxed);
        }
        Self { cells: buffer, len }
    }

    pub(crate) fn into_buffer(self) -> Box<[AtomicIsize]> {
        self.cells
    }

    /// Number of usable words.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there are no words.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads word `index`.
    pub fn get(&self, index: usize) -> Option<Word> {
        (index < self.len).then(|| self.cells[index].load(Ordering::Relaxed))
    }

    /// Writes word `index`; returns false when out of range.
    pub fn set(&self, index: usize, value: Word) -> bool {
        if index < self.len {
            self.cells[index].store(value, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Reads word `index`, faulting when out of range.
    pub fn load(&self, index: usize) -> Result<Word, Fault> {
        self.get(index).ok_or(Fault::MemoryAccess {
            index: index as i64,
            size: self.len as i64,
        })
    }

    /// Writes word `index`, faulting when out of range.
    pub fn store(&self, index: usize, value: Word) -> Result<(), Fault> {
        if self.set(index, value) {
            Ok(())
        } else {
            Err(Fault::MemoryAccess {
                index: index as i64,
                size: self.len as i64,
            })
        }
    }

    /// Copies all words out.
    pub fn to_vec(&self) -> Vec<Word> {
        self.cells[..self.len]
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }
}

pub(crate) fn fresh_buffer(len: usize) -> Box<[AtomicIsize]> {
    (0..len).map(|_| AtomicIsize::new(0)).collect()
}

/// One heap allocation.
#[derive(Debug)]
pub struct HeapBlock {
    size_class: Option<usize>,
    kind: BlockKind,
    mark: AtomicBool,
    bytes: usize,
    words: Words,
    monitor: OnceLock<Arc<Monitor>>,
}

impl HeapBlock {
    pub(crate) fn new(kind: BlockKind, size_class: Option<usize>, bytes: usize, words: Words) -> Self {
        Self {
            size_class,
            kind,
            mark: AtomicBool::new(false),
            bytes,
            words,
            monitor: OnceLock::new(),
        }
    }

    /// What the block holds.
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Pool the block's buffer returns to, `None` when unpooled.
    pub fn size_class(&self) -> Option<usize> {
        self.size_class
    }

    /// Bytes charged against the allocation total (header included).
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Payload words.
    pub fn words(&self) -> &Words {
        &self.words
    }

    /// Returns true while the block is marked in a running cycle.
    pub fn is_marked(&self) -> bool {
        self.mark.load(Ordering::Acquire)
    }

    /// Sets the mark bit; true only for the caller that set it.
    pub(crate) fn try_mark(&self) -> bool {
        self.mark
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clears the mark bit, returning whether it was set.
    pub(crate) fn clear_mark(&self) -> bool {
        self.mark.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn into_buffer(self) -> Box<[AtomicIsize]> {
        self.words.into_buffer()
    }

    /// The block's user-level lock, created on first use.
    pub fn monitor(&self) -> Arc<Monitor> {
        self.monitor.get_or_init(|| Arc::new(Monitor::new())).clone()
    }

    /// Returns true once `THREAD_MUTEX` or a critical section touched the block.
    pub fn has_monitor(&self) -> bool {
        self.monitor.get().is_some()
    }

    /// Element count of an array block (`payload[0]`).
    pub fn array_len(&self) -> usize {
        self.words.get(0).map_or(0, |n| n.max(0) as usize)
    }

    /// Dimension count of an array block (`payload[1]`).
    pub fn array_dims(&self) -> usize {
        self.words.get(1).map_or(0, |n| n.max(0) as usize)
    }

    /// Extent of dimension `dim`.
    pub fn array_extent(&self, dim: usize) -> usize {
        self.words
            .get(ARRAY_HEADER_WORDS + dim)
            .map_or(0, |n| n.max(0) as usize)
    }

    /// Word offset of the first element.
    pub fn array_data_offset(&self) -> usize {
        ARRAY_HEADER_WORDS + self.array_dims()
    }

    /// Words of an array's element region, including a char array's terminator.
    pub fn array_data_words(&self) -> usize {
        self.words.len().saturating_sub(self.array_data_offset())
    }
}

/// Bytes charged for a block with `payload_words` words.
pub fn block_bytes(payload_words: usize) -> Option<usize> {
    payload_words
        .checked_add(HEADER_WORDS)?
        .checked_mul(WORD_BYTES)
}
