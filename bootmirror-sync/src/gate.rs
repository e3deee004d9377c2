//! Single global mutation gate over the backup tree.
//!
//! Backed by `tokio::sync::Mutex`, which admits waiters in FIFO order, so
//! mutations land in the order they were submitted. Callers are blocking
//! code: plain threads or `spawn_blocking` tasks, never async contexts.
//! A guard must not re-enter the gate.

use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MutationGate {
    lock: Mutex<()>,
}

/// Held while a mutation runs; the next waiter is admitted on drop.
pub type GateGuard<'a> = MutexGuard<'a, ()>;

impl MutationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every earlier caller has finished its mutation.
    pub fn enter(&self) -> GateGuard<'_> {
        self.lock.blocking_lock()
    }
}
