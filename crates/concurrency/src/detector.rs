//! Wait-for graph and deadlock detection
//!
//! The graph is two maps:
//! - waiter → the single resource it is blocked on (at most one per thread)
//! - resource → its current owner
//!
//! Both are only read and written under the detector gate, so a walk always
//! sees a consistent picture of who waits for whom.
//!
//! ## Decision procedure
//!
//! ```text
//! 1. The requester T publishes T → R
//! 2. victim = T, cursor = owner(R)
//! 3. while cursor exists and cursor != T:
//!      if (start(cursor), cursor) > (start(victim), victim): victim = cursor
//!      cursor = owner(wait(cursor)), stop if cursor waits for nothing
//! 4. walk ended at T  => cycle; abort the newest transaction in it
//!    otherwise        => no deadlock, T may block on R
//! ```
//!
//! The newest transaction in the cycle has done the least work; equal start
//! times are broken by the larger thread identity.
//!
//! Two cases end the walk early without a cycle through T:
//! - the cursor's transaction is already aborted (its wait edge is stale, it
//!   will never acquire again)
//! - the cursor was already visited (a cycle not containing T that is waiting
//!   for its victim to clean up)

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use txnguard_core::{ResourceId, Timestamp, TxnId};

/// Transactions on a detected cycle, starting with the requester
pub type Cycle = SmallVec<[TxnId; 8]>;

/// Outcome of inspecting the graph for a new wait edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No cycle through the requester; it may block on the resource
    NoDeadlock,

    /// The requester is the newest transaction on the cycle and must abort
    /// without blocking
    AbortRequester {
        /// Transactions on the cycle
        cycle: Cycle,
    },

    /// Another transaction on the cycle is newer; it must be aborted and its
    /// pending wait cancelled, after which the requester may block
    AbortVictim {
        /// The transaction to abort
        victim: TxnId,
        /// Resource the victim is blocked on
        waiting_on: ResourceId,
        /// Transactions on the cycle
        cycle: Cycle,
    },
}

impl Verdict {
    /// Check if a cycle was found
    pub fn is_deadlock(&self) -> bool {
        !matches!(self, Verdict::NoDeadlock)
    }
}

/// Wait edges and resource owners
#[derive(Debug, Default)]
pub struct WaitForGraph {
    waits: FxHashMap<TxnId, ResourceId>,
    owners: FxHashMap<ResourceId, TxnId>,
}

impl WaitForGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `waiter` is about to block on `rid`
    ///
    /// A thread has at most one edge; a previous one is replaced and returned.
    pub fn publish_wait(&mut self, waiter: TxnId, rid: ResourceId) -> Option<ResourceId> {
        self.waits.insert(waiter, rid)
    }

    /// Remove `waiter`'s edge
    pub fn clear_wait(&mut self, waiter: TxnId) -> Option<ResourceId> {
        self.waits.remove(&waiter)
    }

    /// Resource `waiter` is blocked on
    pub fn waiting_on(&self, waiter: TxnId) -> Option<&ResourceId> {
        self.waits.get(&waiter)
    }

    /// Record `owner` as the holder of `rid`
    pub fn set_owner(&mut self, rid: ResourceId, owner: TxnId) -> Option<TxnId> {
        self.owners.insert(rid, owner)
    }

    /// Forget the holder of `rid`
    pub fn clear_owner(&mut self, rid: &ResourceId) -> Option<TxnId> {
        self.owners.remove(rid)
    }

    /// Current holder of `rid`
    pub fn owner(&self, rid: &ResourceId) -> Option<TxnId> {
        self.owners.get(rid).copied()
    }

    /// All (resource, owner) pairs
    pub fn owners(&self) -> impl Iterator<Item = (&ResourceId, TxnId)> {
        self.owners.iter().map(|(rid, tid)| (rid, *tid))
    }

    /// All (waiter, resource) edges
    pub fn waits(&self) -> impl Iterator<Item = (TxnId, &ResourceId)> {
        self.waits.iter().map(|(tid, rid)| (*tid, rid))
    }

    /// Walk the chain of owners starting at `requested` and decide whether
    /// `requester` closes a cycle
    ///
    /// `live_start` returns a transaction's start time, or `None` if it has
    /// no live, non-aborted record.
    pub fn inspect<F>(&self, requester: TxnId, requested: &ResourceId, live_start: F) -> Verdict
    where
        F: Fn(TxnId) -> Option<Timestamp>,
    {
        let Some(requester_start) = live_start(requester) else {
            return Verdict::NoDeadlock;
        };

        // Ordering key: newer start loses, then larger id loses.
        let mut victim = (requester_start, requester);
        let mut victim_waits: Option<&ResourceId> = None;
        let mut path: Cycle = SmallVec::new();
        path.push(requester);

        let mut cursor = self.owner(requested);
        while let Some(current) = cursor {
            if current == requester {
                return match victim_waits {
                    None => Verdict::AbortRequester { cycle: path },
                    Some(waiting_on) => Verdict::AbortVictim {
                        victim: victim.1,
                        waiting_on: waiting_on.clone(),
                        cycle: path,
                    },
                };
            }
            if path.contains(&current) {
                break;
            }
            let Some(start) = live_start(current) else {
                break;
            };
            let Some(next) = self.waits.get(&current) else {
                break;
            };

            if (start, current) > victim {
                victim = (start, current);
                victim_waits = Some(next);
            }
            path.push(current);
            cursor = self.owner(next);
        }

        Verdict::NoDeadlock
    }
}
