//! User-level object locks.
//!
//! Each heap object can carry one [`Monitor`]. `CRITICAL_START` enters it and
//! `CRITICAL_END` leaves it; the owner is the VM thread id, so a thread may
//! re-enter a monitor it already holds.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<u64>,
    depth: usize,
}

/// A reentrant lock owned by a VM thread.
#[derive(Debug, Default)]
pub struct Monitor {
    state: Mutex<MonitorState>,
    available: Condvar,
}

impl Monitor {
    /// Creates an unowned monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `thread` owns the monitor.
    pub fn enter(&self, thread: u64) {
        let mut state = self.state.lock();
        while matches!(state.owner, Some(owner) if owner != thread) {
            self.available.wait(&mut state);
        }
        state.owner = Some(thread);
        state.depth += 1;
    }

    /// Takes the monitor if it is free or already held by `thread`.
    pub fn try_enter(&self, thread: u64) -> bool {
        let mut state = self.state.lock();
        match state.owner {
            Some(owner) if owner != thread => false,
            _ => {
                state.owner = Some(thread);
                state.depth += 1;
                true
            }
        }
    }

    /// Releases one level of ownership held by `thread`.
    ///
    /// # Returns
    ///
    /// `false` if `thread` does not own the monitor.
    pub fn exit(&self, thread: u64) -> bool {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return false;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.available.notify_one();
        }
        true
    }

    /// Current owner.
    pub fn owner(&self) -> Option<u64> {
        self.state.lock().owner
    }
}
