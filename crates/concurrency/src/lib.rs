//! Concurrency layer for txnguard
//!
//! This crate implements pessimistic, exclusive-lock transactions with:
//! - Registry: per-thread transaction records
//! - LockTable: one FIFO-fair exclusive lock per resource
//! - WaitForGraph: deadlock detection on every acquisition (newest loses)
//! - TransactionManager: begin / operate / commit / rollback

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod detector;
pub mod lock_table;
pub mod manager;
pub mod metrics;
pub mod registry;

pub use builder::{ManagerBuilder, ManagerOptions};
pub use detector::{Cycle, Verdict, WaitForGraph};
pub use lock_table::{FairLock, LockTable};
pub use manager::{LockSnapshot, TransactionManager};
pub use metrics::TransactionMetrics;
pub use registry::{Registry, TransactionRecord, TransactionStatus, UndoEntry};
