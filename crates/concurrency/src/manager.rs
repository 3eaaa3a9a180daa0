//! Transaction manager: the public transaction API
//!
//! Each thread drives at most one transaction through:
//! - [`begin`](TransactionManager::begin)
//! - [`operate`](TransactionManager::operate)
//! - [`commit`](TransactionManager::commit)
//! - [`rollback`](TransactionManager::rollback)
//!
//! Every resource is acquired exclusively the first time a transaction
//! operates on it and stays held until commit or rollback.
//!
//! ## Acquire Sequence
//!
//! ```text
//! 1. Take the detector gate
//! 2. Publish wait edge T → R, walk the wait-for graph
//! 3. IF T is the newest on a cycle: clear edge, mark T aborted, return
//! 4. IF another transaction V is the newest: mark V aborted, interrupt V
//! 5. Release the gate
//! 6. Block on R's FIFO lock
//! 7. Granted: under the gate, clear edge and record T as owner
//!    Interrupted: under the gate, clear edge; surface Interrupted
//! ```
//!
//! ## Commit / Rollback
//!
//! Rollback undoes the log in reverse order while the resources are still
//! held, then releases. Both commit and rollback release every held resource
//! and destroy the record inside one gate section, so a detector walk never
//! sees ownership that is being torn down.
//!
//! No lock other than the resource's own is held while `execute` or `undo`
//! runs; in particular the detector gate never is.

use crate::builder::{ManagerBuilder, ManagerOptions};
use crate::detector::{Verdict, WaitForGraph};
use crate::lock_table::LockTable;
use crate::metrics::{MetricsRecorder, TransactionMetrics};
use crate::registry::{Registry, TransactionRecord};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use txnguard_core::{
    Error, Resource, ResourceId, ResourceOperation, Result, TimeProvider, Timestamp, TxnId,
};

/// Ownership and wait edges at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSnapshot {
    /// (resource, owner), sorted by resource
    pub owners: Vec<(ResourceId, TxnId)>,
    /// (waiter, resource), sorted by waiter
    pub waits: Vec<(TxnId, ResourceId)>,
}

/// Coordinates per-thread transactions over a fixed set of resources
///
/// One manager is shared by all threads (typically behind an `Arc`). The
/// calling thread's identity ([`TxnId::current`]) selects its transaction.
///
/// # Thread Safety
///
/// - Each resource is guarded by a FIFO-fair exclusive lock; its state is
///   only touched by the owning transaction.
/// - Wait edges, owners, victim marking and release-all are serialized by a
///   single detector gate.
/// - A transaction's undo log and held set are only touched by its own thread.
pub struct TransactionManager<R> {
    options: ManagerOptions,

    /// Resource state. The mutex is never contended by transactions: the
    /// FIFO lock in `locks` decides who may touch it.
    resources: FxHashMap<ResourceId, Mutex<R>>,

    locks: LockTable,

    registry: Registry<R>,

    /// Detector gate
    gate: Mutex<WaitForGraph>,

    clock: Arc<dyn TimeProvider>,

    metrics: MetricsRecorder,
}

impl<R: Resource + 'static> TransactionManager<R> {
    /// Create a manager over `resources` with default options
    ///
    /// Fails with [`Error::DuplicateResourceId`] if two resources share an id.
    pub fn new(resources: impl IntoIterator<Item = R>, clock: Arc<dyn TimeProvider>) -> Result<Self> {
        Self::with_options(resources, clock, ManagerOptions::default())
    }

    /// Create a builder
    pub fn builder() -> ManagerBuilder<R> {
        ManagerBuilder::new()
    }

    /// Create a manager with explicit options
    pub fn with_options(
        resources: impl IntoIterator<Item = R>,
        clock: Arc<dyn TimeProvider>,
        options: ManagerOptions,
    ) -> Result<Self> {
        let mut by_id = FxHashMap::default();
        for resource in resources {
            let id = resource.id();
            if by_id.contains_key(&id) {
                return Err(Error::DuplicateResourceId(id));
            }
            by_id.insert(id, Mutex::new(resource));
        }
        let locks = LockTable::new(by_id.keys().cloned());
        debug!(manager = %options.name, resources = by_id.len(), "Transaction manager created");

        Ok(Self {
            options,
            resources: by_id,
            locks,
            registry: Registry::new(),
            gate: Mutex::new(WaitForGraph::new()),
            clock,
            metrics: MetricsRecorder::default(),
        })
    }

    // ========================================================================
    // Transaction API
    // ========================================================================

    /// Start a transaction on the calling thread
    ///
    /// Fails with [`Error::AnotherTransactionActive`] if the thread already
    /// has one, aborted or not.
    pub fn begin(&self) -> Result<()> {
        let tid = TxnId::current();
        let record = self.registry.begin(tid, || self.clock.now())?;
        debug!(
            manager = %self.options.name,
            txn = %tid,
            started_at = record.started_at(),
            "Transaction started"
        );
        Ok(())
    }

    /// Apply `operation` to resource `rid` within the calling thread's
    /// transaction
    ///
    /// Preconditions are checked in this order:
    /// 1. [`Error::ActiveTransactionAborted`] if the transaction was aborted
    /// 2. [`Error::NoActiveTransaction`] if there is none
    /// 3. [`Error::UnknownResourceId`] if `rid` is not managed here
    ///
    /// The resource is acquired first if this transaction does not hold it
    /// yet. Losing a deadlock surfaces as [`Error::ActiveTransactionAborted`]
    /// (aborted without blocking) or [`Error::Interrupted`] (aborted while
    /// blocked); either way the caller must roll back.
    ///
    /// If `operation` fails, its error is returned as
    /// [`Error::ResourceOperation`]. Nothing is rolled back: the transaction
    /// stays ongoing and keeps the resource.
    pub fn operate<O>(&self, rid: &ResourceId, operation: O) -> Result<()>
    where
        O: ResourceOperation<R> + 'static,
    {
        let record = self.live_record(TxnId::current())?;
        let resource = self
            .resources
            .get(rid)
            .ok_or_else(|| Error::UnknownResourceId(rid.clone()))?;

        if !record.holds(rid) {
            self.acquire(&record, rid)?;
        }

        let result = operation.execute(&mut resource.lock());
        match result {
            Ok(()) => {
                record.log_undo(rid.clone(), Box::new(operation));
                Ok(())
            }
            Err(source) => {
                debug!(
                    manager = %self.options.name,
                    txn = %record.id(),
                    resource = %rid,
                    error = %source,
                    "Resource operation failed"
                );
                Err(Error::ResourceOperation {
                    resource: rid.clone(),
                    source,
                })
            }
        }
    }

    /// Commit the calling thread's transaction
    ///
    /// Fails with [`Error::ActiveTransactionAborted`] (checked first) or
    /// [`Error::NoActiveTransaction`]. An aborted transaction is left in place
    /// for [`rollback`](Self::rollback).
    pub fn commit(&self) -> Result<()> {
        let tid = TxnId::current();
        let record = self.live_record(tid)?;

        let released = {
            let mut graph = self.gate.lock();
            let released = self.release_all(&mut graph, &record);
            self.registry.destroy(tid);
            released
        };

        self.metrics.record_commit();
        debug!(
            manager = %self.options.name,
            txn = %tid,
            released,
            operations = record.undo_len(),
            "Transaction committed"
        );
        Ok(())
    }

    /// Roll back the calling thread's transaction
    ///
    /// A no-op if the thread has no transaction. Otherwise, whether ongoing or
    /// aborted, undoes every logged operation in reverse order, releases all
    /// held resources and forgets the transaction. A failing `undo` is logged
    /// and skipped.
    pub fn rollback(&self) {
        let tid = TxnId::current();
        let Some(record) = self.registry.current(tid) else {
            return;
        };

        let undo_log = record.take_undo_log();
        let undone = undo_log.len();
        for entry in undo_log.into_iter().rev() {
            let Some(resource) = self.resources.get(&entry.resource) else {
                continue;
            };
            if let Err(error) = entry.operation.undo(&mut resource.lock()) {
                warn!(
                    manager = %self.options.name,
                    txn = %tid,
                    resource = %entry.resource,
                    %error,
                    "Undo failed during rollback, continuing"
                );
            }
        }

        let released = {
            let mut graph = self.gate.lock();
            let released = self.release_all(&mut graph, &record);
            self.registry.destroy(tid);
            released
        };

        self.metrics.record_rollback();
        debug!(
            manager = %self.options.name,
            txn = %tid,
            undone,
            released,
            was_aborted = record.is_aborted(),
            "Transaction rolled back"
        );
    }

    /// Check if the calling thread has a transaction (ongoing or aborted)
    pub fn is_active(&self) -> bool {
        self.registry.contains(TxnId::current())
    }

    /// Check if the calling thread's transaction was aborted
    pub fn is_aborted(&self) -> bool {
        self.registry
            .current(TxnId::current())
            .map(|record| record.is_aborted())
            .unwrap_or(false)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Start time of the calling thread's transaction
    pub fn current_start_time(&self) -> Option<Timestamp> {
        self.registry
            .current(TxnId::current())
            .map(|record| record.started_at())
    }

    /// Current owner of `rid`
    pub fn owner_of(&self, rid: &ResourceId) -> Option<TxnId> {
        self.gate.lock().owner(rid)
    }

    /// Resource `tid` is currently blocked on (or about to block on)
    pub fn waiting_on(&self, tid: TxnId) -> Option<ResourceId> {
        self.gate.lock().waiting_on(tid).cloned()
    }

    /// All owners and wait edges, read atomically
    pub fn lock_snapshot(&self) -> LockSnapshot {
        let graph = self.gate.lock();
        let mut owners: Vec<_> = graph.owners().map(|(r, t)| (r.clone(), t)).collect();
        let mut waits: Vec<_> = graph.waits().map(|(t, r)| (t, r.clone())).collect();
        drop(graph);
        owners.sort();
        waits.sort();
        LockSnapshot { owners, waits }
    }

    /// Read a resource's state outside of any transaction
    pub fn with_resource<T>(&self, rid: &ResourceId, f: impl FnOnce(&R) -> T) -> Result<T> {
        let resource = self
            .resources
            .get(rid)
            .ok_or_else(|| Error::UnknownResourceId(rid.clone()))?;
        let state = resource.lock();
        Ok(f(&state))
    }

    /// Ids of all managed resources, sorted
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<_> = self.resources.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.metrics.snapshot(self.registry.len())
    }

    /// Options this manager was built with
    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// The calling thread's record, with the aborted check before the
    /// missing check so that a victim learns of its abort first
    fn live_record(&self, tid: TxnId) -> Result<Arc<TransactionRecord<R>>> {
        match self.registry.current(tid) {
            Some(record) if record.is_aborted() => Err(Error::ActiveTransactionAborted),
            Some(record) => Ok(record),
            None => Err(Error::NoActiveTransaction),
        }
    }

    fn acquire(&self, record: &TransactionRecord<R>, rid: &ResourceId) -> Result<()> {
        let tid = record.id();

        {
            let mut graph = self.gate.lock();
            graph.publish_wait(tid, rid.clone());
            let verdict = graph.inspect(tid, rid, |t| self.registry.live_started_at(t));
            match verdict {
                Verdict::NoDeadlock => {}
                Verdict::AbortRequester { cycle } => {
                    graph.clear_wait(tid);
                    record.mark_aborted();
                    self.metrics.record_self_abort();
                    warn!(
                        manager = %self.options.name,
                        txn = %tid,
                        resource = %rid,
                        cycle_len = cycle.len(),
                        "Deadlock detected, requester is the victim"
                    );
                    return Err(Error::ActiveTransactionAborted);
                }
                Verdict::AbortVictim {
                    victim,
                    waiting_on,
                    cycle,
                } => {
                    self.registry.mark_aborted(victim);
                    self.locks.interrupt(&waiting_on, victim);
                    self.metrics.record_interrupt();
                    warn!(
                        manager = %self.options.name,
                        txn = %tid,
                        resource = %rid,
                        %victim,
                        victim_resource = %waiting_on,
                        cycle_len = cycle.len(),
                        "Deadlock detected, interrupting victim"
                    );
                }
            }
        }

        match self.locks.acquire(rid, tid) {
            Ok(()) => {
                {
                    let mut graph = self.gate.lock();
                    graph.clear_wait(tid);
                    graph.set_owner(rid.clone(), tid);
                }
                record.hold(rid.clone());
                debug!(manager = %self.options.name, txn = %tid, resource = %rid, "Resource acquired");
                Ok(())
            }
            Err(error) => {
                self.gate.lock().clear_wait(tid);
                debug!(
                    manager = %self.options.name,
                    txn = %tid,
                    resource = %rid,
                    %error,
                    "Resource wait cancelled"
                );
                Err(error)
            }
        }
    }

    /// Release every resource `record` holds. Caller holds the gate.
    fn release_all(&self, graph: &mut WaitForGraph, record: &TransactionRecord<R>) -> usize {
        let held = record.take_held();
        for rid in &held {
            graph.clear_owner(rid);
            self.locks.release(rid);
        }
        held.len()
    }
}
