//! Virtual method dispatch cache
//!
//! Maps `(receiver class, declared method)` to the method that actually
//! runs. Entries are filled on the first call through a receiver class and
//! never invalidated: the program is immutable once loaded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use bytecode_system::{MethodRef, Program};
use core_types::Fault;

/// Key of one cached binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    /// Runtime class of the receiver
    pub receiver_class: usize,
    /// Method named by the call instruction
    pub declared: MethodRef,
}

/// Shared cache of resolved virtual calls.
#[derive(Debug, Default)]
pub struct DispatchCache {
    entries: Mutex<HashMap<DispatchKey, MethodRef>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DispatchCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `declared` against `receiver_class`.
    ///
    /// On a miss, walks the receiver's parent chain looking for a method
    /// named `Class` + the declared method's name suffix, and caches the
    /// first match.
    ///
    /// # Returns
    ///
    /// `Fault::VirtualDispatch` if no class on the chain defines it.
    pub fn resolve(
        &self,
        program: &Program,
        receiver_class: usize,
        declared: MethodRef,
    ) -> Result<MethodRef, Fault> {
        let key = DispatchKey {
            receiver_class,
            declared,
        };
        if let Some(found) = self.entries.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*found);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let method = program
            .method_ref(declared)
            .ok_or(Fault::UnknownMethod {
                class: declared.class_id as i64,
                method: declared.method_id as i64,
            })?;
        let suffix = method.name_suffix();

        let mut current = Some(receiver_class);
        while let Some(class_id) = current {
            let class = program
                .class(class_id)
                .ok_or(Fault::UnknownClass(class_id as i64))?;
            let qualified = format!("{}{}", class.name(), suffix);
            if let Some(found) = class.method_by_name(&qualified) {
                let target = MethodRef::new(class_id, found.id());
                self.entries.lock().insert(key, target);
                return Ok(target);
            }
            current = class.parent_id();
        }
        Err(Fault::VirtualDispatch(method.name().to_string()))
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that walked the class chain.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of cached bindings.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
