//! Transaction registry
//!
//! One record per thread with a live transaction. A record carries:
//! - the start timestamp (immutable)
//! - the status, the only field written by foreign threads (the detector,
//!   under the detector gate); the write is a single atomic ONGOING → ABORTED
//! - the undo log and held-resource set, touched only by the owning thread
//!
//! Records are handed out as `Arc`s so that no map guard is ever held across
//! a blocking wait or a resource operation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use txnguard_core::{Error, ResourceId, ResourceOperation, Result, Timestamp, TxnId};

/// Status of a live transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Running normally
    Ongoing,
    /// Chosen as a deadlock victim; only rollback (or a failing commit) may follow
    Aborted,
}

/// One successful operation, kept for rollback
pub struct UndoEntry<R> {
    /// Resource the operation ran on
    pub resource: ResourceId,
    /// The operation itself
    pub operation: Box<dyn ResourceOperation<R>>,
}

impl<R> std::fmt::Debug for UndoEntry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoEntry")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

struct OwnerState<R> {
    undo_log: Vec<UndoEntry<R>>,
    held: FxHashSet<ResourceId>,
}

/// A live transaction
pub struct TransactionRecord<R> {
    id: TxnId,
    started_at: Timestamp,
    aborted: AtomicBool,
    /// Only the owning thread locks this, so it is never contended.
    owner_state: Mutex<OwnerState<R>>,
}

impl<R> TransactionRecord<R> {
    fn new(id: TxnId, started_at: Timestamp) -> Self {
        Self {
            id,
            started_at,
            aborted: AtomicBool::new(false),
            owner_state: Mutex::new(OwnerState {
                undo_log: Vec::new(),
                held: FxHashSet::default(),
            }),
        }
    }

    /// Owning thread
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Start timestamp
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        if self.is_aborted() {
            TransactionStatus::Aborted
        } else {
            TransactionStatus::Ongoing
        }
    }

    /// Check if the transaction was chosen as a deadlock victim
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Flip ONGOING → ABORTED; returns whether this call did the flip
    pub fn mark_aborted(&self) -> bool {
        !self.aborted.swap(true, Ordering::AcqRel)
    }

    /// Check if `rid` is already held by this transaction
    pub fn holds(&self, rid: &ResourceId) -> bool {
        self.owner_state.lock().held.contains(rid)
    }

    /// Add `rid` to the held set
    pub fn hold(&self, rid: ResourceId) {
        self.owner_state.lock().held.insert(rid);
    }

    /// Number of resources held
    pub fn held_count(&self) -> usize {
        self.owner_state.lock().held.len()
    }

    /// Empty the held set, returning its contents
    pub fn take_held(&self) -> Vec<ResourceId> {
        self.owner_state.lock().held.drain().collect()
    }

    /// Append a successful operation to the undo log
    pub fn log_undo(&self, resource: ResourceId, operation: Box<dyn ResourceOperation<R>>) {
        self.owner_state
            .lock()
            .undo_log
            .push(UndoEntry { resource, operation });
    }

    /// Number of logged operations
    pub fn undo_len(&self) -> usize {
        self.owner_state.lock().undo_log.len()
    }

    /// Take the undo log, in execution order
    pub fn take_undo_log(&self) -> Vec<UndoEntry<R>> {
        std::mem::take(&mut self.owner_state.lock().undo_log)
    }
}

impl<R> std::fmt::Debug for TransactionRecord<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRecord")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Live transactions keyed by thread
pub struct Registry<R> {
    records: DashMap<TxnId, Arc<TransactionRecord<R>>>,
}

impl<R> Registry<R> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Start a transaction for `tid`
    ///
    /// `clock` is only consulted when the thread has no live transaction, and
    /// never while a map shard is locked.
    pub fn begin<F>(&self, tid: TxnId, clock: F) -> Result<Arc<TransactionRecord<R>>>
    where
        F: FnOnce() -> Timestamp,
    {
        if self.records.contains_key(&tid) {
            return Err(Error::AnotherTransactionActive);
        }
        let record = Arc::new(TransactionRecord::new(tid, clock()));

        // Only the thread `tid` inserts under its own key.
        match self.records.entry(tid) {
            Entry::Occupied(_) => Err(Error::AnotherTransactionActive),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&record));
                Ok(record)
            }
        }
    }

    /// The live transaction of `tid`, if any
    pub fn current(&self, tid: TxnId) -> Option<Arc<TransactionRecord<R>>> {
        self.records.get(&tid).map(|r| Arc::clone(r.value()))
    }

    /// Check if `tid` has a live transaction (ongoing or aborted)
    pub fn contains(&self, tid: TxnId) -> bool {
        self.records.contains_key(&tid)
    }

    /// Start time of `tid`, if it is live and not aborted
    pub fn live_started_at(&self, tid: TxnId) -> Option<Timestamp> {
        self.records
            .get(&tid)
            .filter(|r| !r.is_aborted())
            .map(|r| r.started_at())
    }

    /// Mark `tid` aborted; idempotent, returns whether the record exists
    pub fn mark_aborted(&self, tid: TxnId) -> bool {
        match self.records.get(&tid) {
            Some(record) => {
                record.mark_aborted();
                true
            }
            None => false,
        }
    }

    /// Remove `tid`'s record
    pub fn destroy(&self, tid: TxnId) -> Option<Arc<TransactionRecord<R>>> {
        self.records.remove(&tid).map(|(_, record)| record)
    }

    /// Number of live transactions
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no transaction is live
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}
