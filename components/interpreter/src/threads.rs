//! OS threads started by `ASYNC_MTHD_CALL`

use std::collections::HashMap;
use std::thread::JoinHandle;

use parking_lot::{Mutex, MutexGuard};

/// Join handles of running VM threads, keyed by VM thread id.
///
/// A thread removes its own entry when it finishes; joining a thread that
/// is no longer registered returns immediately.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    handles: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl ThreadRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the registry; a spawner holds this across `spawn` so the new
    /// thread cannot deregister before it is inserted.
    pub fn lock(&self) -> MutexGuard<'_, HashMap<u64, JoinHandle<()>>> {
        self.handles.lock()
    }

    /// Takes the handle for `id`; the caller may join it or drop it.
    pub fn remove(&self, id: u64) -> Option<JoinHandle<()>> {
        self.handles.lock().remove(&id)
    }

    /// Returns true while thread `id` is registered.
    pub fn contains(&self, id: u64) -> bool {
        self.handles.lock().contains_key(&id)
    }

    /// Number of registered threads.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns true when no spawned thread is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Joins every registered thread, including ones started meanwhile.
    pub fn join_all(&self) {
        loop {
            let next = {
                let mut handles = self.handles.lock();
                let id = handles.keys().next().copied();
                id.and_then(|id| handles.remove(&id))
            };
            match next {
                Some(handle) => {
                    let _ = handle.join();
                }
                None => break,
            }
        }
    }
}
