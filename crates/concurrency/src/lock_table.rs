//! Resource lock table
//!
//! One exclusive, FIFO-fair lock per resource. Waiters are granted the lock
//! strictly in arrival order, so a steady stream of short owners cannot starve
//! an old waiter.
//!
//! # Cancellation
//!
//! The deadlock detector cancels a victim's pending wait with
//! [`LockTable::interrupt`]. The interruption is sticky: if it lands after the
//! victim published its wait edge but before it entered the queue, the victim
//! sees it on arrival. A cancelled waiter leaves the queue without being
//! granted and gets [`Error::Interrupted`].
//!
//! Ownership bookkeeping (who holds what) is not kept here; it lives in the
//! wait-for graph under the detector gate.

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use txnguard_core::{Error, ResourceId, Result, TxnId};

#[derive(Debug, Default)]
struct LockState {
    /// Whether a permit is currently out
    held: bool,
    /// Waiters in arrival order
    queue: VecDeque<TxnId>,
    /// Pending cancellations, consumed by the waiter they target
    interrupted: FxHashSet<TxnId>,
}

/// A FIFO-fair exclusive lock with cancellable waits
#[derive(Debug, Default)]
pub struct FairLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl FairLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is granted to `waiter`
    ///
    /// Returns [`Error::Interrupted`] if the wait was cancelled, before or
    /// during blocking. A cancelled waiter never holds the lock.
    pub fn acquire(&self, waiter: TxnId) -> Result<()> {
        let mut state = self.state.lock();
        if state.interrupted.remove(&waiter) {
            return Err(Error::Interrupted);
        }
        state.queue.push_back(waiter);

        loop {
            if state.interrupted.remove(&waiter) {
                if let Some(pos) = state.queue.iter().position(|t| *t == waiter) {
                    state.queue.remove(pos);
                }
                // The head of the queue may have changed.
                self.changed.notify_all();
                return Err(Error::Interrupted);
            }
            if !state.held && state.queue.front() == Some(&waiter) {
                state.queue.pop_front();
                state.held = true;
                return Ok(());
            }
            self.changed.wait(&mut state);
        }
    }

    /// Return the permit and wake the queue
    pub fn release(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.held, "release of a lock that is not held");
        state.held = false;
        self.changed.notify_all();
    }

    /// Cancel the pending (or imminent) wait of `waiter`
    pub fn interrupt(&self, waiter: TxnId) {
        let mut state = self.state.lock();
        state.interrupted.insert(waiter);
        self.changed.notify_all();
    }

    /// Whether a permit is currently out
    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    /// Number of threads blocked on this lock
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

/// The set of resource locks, fixed at construction
#[derive(Debug, Default)]
pub struct LockTable {
    locks: FxHashMap<ResourceId, FairLock>,
}

impl LockTable {
    /// Create a table with one lock per resource id
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ResourceId>,
    {
        Self {
            locks: ids.into_iter().map(|id| (id, FairLock::new())).collect(),
        }
    }

    fn lock_for(&self, rid: &ResourceId) -> Result<&FairLock> {
        self.locks
            .get(rid)
            .ok_or_else(|| Error::UnknownResourceId(rid.clone()))
    }

    /// Block until `rid` is granted to `waiter`
    pub fn acquire(&self, rid: &ResourceId, waiter: TxnId) -> Result<()> {
        self.lock_for(rid)?.acquire(waiter)
    }

    /// Release `rid`
    pub fn release(&self, rid: &ResourceId) {
        if let Some(lock) = self.locks.get(rid) {
            lock.release();
        }
    }

    /// Cancel `waiter`'s wait on `rid`
    pub fn interrupt(&self, rid: &ResourceId, waiter: TxnId) {
        if let Some(lock) = self.locks.get(rid) {
            lock.interrupt(waiter);
        }
    }

    /// Whether `rid` is currently held
    pub fn is_held(&self, rid: &ResourceId) -> bool {
        self.locks.get(rid).map(FairLock::is_held).unwrap_or(false)
    }

    /// Number of threads blocked on `rid`
    pub fn queue_len(&self, rid: &ResourceId) -> usize {
        self.locks.get(rid).map(FairLock::queue_len).unwrap_or(0)
    }

    /// Number of managed resources
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if the table manages no resources
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
