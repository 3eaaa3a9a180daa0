//! Transaction counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a manager's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetrics {
    /// Transactions that committed
    pub total_committed: u64,
    /// Transactions that were rolled back (voluntarily or after an abort)
    pub total_rolled_back: u64,
    /// Deadlock cycles found by the detector
    pub deadlocks_detected: u64,
    /// Cycles broken by the requester aborting itself
    pub self_aborts: u64,
    /// Cycles broken by aborting and interrupting a waiting transaction
    pub victims_interrupted: u64,
    /// Transactions currently registered (ongoing or aborted)
    pub active_count: u64,
}

impl TransactionMetrics {
    /// Fraction of finished transactions that committed (0.0 - 1.0)
    ///
    /// Returns 1.0 when nothing has finished yet.
    pub fn commit_rate(&self) -> f64 {
        let finished = self.total_committed + self.total_rolled_back;
        if finished == 0 {
            1.0
        } else {
            self.total_committed as f64 / finished as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    committed: AtomicU64,
    rolled_back: AtomicU64,
    self_aborts: AtomicU64,
    interrupts: AtomicU64,
}

impl MetricsRecorder {
    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_self_abort(&self) {
        self.self_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active_count: usize) -> TransactionMetrics {
        let self_aborts = self.self_aborts.load(Ordering::Relaxed);
        let victims_interrupted = self.interrupts.load(Ordering::Relaxed);
        TransactionMetrics {
            total_committed: self.committed.load(Ordering::Relaxed),
            total_rolled_back: self.rolled_back.load(Ordering::Relaxed),
            deadlocks_detected: self_aborts + victims_interrupted,
            self_aborts,
            victims_interrupted,
            active_count: active_count as u64,
        }
    }
}
