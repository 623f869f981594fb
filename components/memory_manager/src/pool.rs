//! Size-classed buffer pools.
//!
//! Block sizes are rounded up to the smallest class that fits. Swept buffers
//! go back to their class's free list, up to a per-class cap; blocks larger
//! than the biggest class are unpooled and freed directly.

use std::sync::atomic::AtomicIsize;

use core_types::WORD_BYTES;

use crate::block::{fresh_buffer, HEADER_WORDS};

/// Block sizes in bytes, header included.
pub const SIZE_CLASSES: [usize; 18] = [
    16,
    32,
    64,
    128,
    256,
    512,
    1 << 10,
    2 << 10,
    4 << 10,
    8 << 10,
    16 << 10,
    32 << 10,
    64 << 10,
    128 << 10,
    256 << 10,
    512 << 10,
    1 << 20,
    2 << 20,
];

/// Maximum free buffers kept per class.
pub const POOL_LIMITS: [usize; 18] = [
    8192, 8192, 4096, 2048, 2048, 2048, 1024, 1024, 512, 512, 256, 256, 128, 128, 64, 64, 64, 32,
];

/// Smallest class able to hold `bytes`, or `None` when unpooled.
pub fn size_class_for(bytes: usize) -> Option<usize> {
    SIZE_CLASSES.iter().position(|class| *class >= bytes)
}

/// Payload words a buffer of `class` provides.
pub fn class_payload_words(class: usize) -> usize {
    (SIZE_CLASSES[class] / WORD_BYTES).saturating_sub(HEADER_WORDS)
}

/// Free buffers by size class.
#[derive(Debug)]
pub struct Pools {
    free: Vec<Vec<Box<[AtomicIsize]>>>,
    hits: u64,
    misses: u64,
}

impl Pools {
    /// Creates empty pools.
    pub fn new() -> Self {
        Self {
            free: SIZE_CLASSES.iter().map(|_| Vec::new()).collect(),
            hits: 0,
            misses: 0,
        }
    }

    /// A buffer for `class`: pooled if one is free, otherwise fresh.
    pub fn take(&mut self, class: usize) -> Box<[AtomicIsize]> {
        match self.free.get_mut(class).and_then(Vec::pop) {
            Some(buffer) => {
                self.hits += 1;
                buffer
            }
            None => {
                self.misses += 1;
                fresh_buffer(class_payload_words(class))
            }
        }
    }

    /// Returns a swept buffer; false (buffer dropped) when the pool is full.
    pub fn give(&mut self, class: usize, buffer: Box<[AtomicIsize]>) -> bool {
        match self.free.get_mut(class) {
            Some(list) if list.len() < POOL_LIMITS[class] => {
                list.push(buffer);
                true
            }
            _ => false,
        }
    }

    /// Free buffers currently held for `class`.
    pub fn available(&self, class: usize) -> usize {
        self.free.get(class).map_or(0, Vec::len)
    }

    /// Allocations served from a pool.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Allocations that needed a fresh buffer.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new()
    }
}
