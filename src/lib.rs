//! # txnguard
//!
//! In-memory transaction manager for a fixed set of named resources.
//!
//! Each thread runs at most one transaction. Within it, the thread applies
//! reversible operations to resources, each acquired exclusively on first use
//! and held until the transaction ends. The manager:
//!
//! - serializes access to every resource (FIFO-fair exclusive locks)
//! - detects deadlocks on every acquisition and aborts the newest
//!   transaction on the cycle (ties: larger thread id)
//! - commits in full, or rolls back in full by undoing in reverse order
//!
//! ## Quick Start
//!
//! ```ignore
//! use txnguard::prelude::*;
//!
//! let manager = Arc::new(
//!     TransactionManager::builder()
//!         .resources(vec![Account::new("alice"), Account::new("bob")])
//!         .build()?,
//! );
//!
//! manager.begin()?;
//! let outcome = manager
//!     .operate(&ResourceId::new("alice"), Withdraw(10))
//!     .and_then(|_| manager.operate(&ResourceId::new("bob"), Deposit(10)));
//! match outcome {
//!     Ok(()) => manager.commit()?,
//!     Err(e) if e.requires_rollback() => manager.rollback(),
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! ## Errors
//!
//! | Error | Meaning | What to do |
//! |-------|---------|------------|
//! | `ActiveTransactionAborted` | lost a deadlock | `rollback()` |
//! | `Interrupted` | lost a deadlock while waiting | `rollback()` |
//! | `ResourceOperation` | the operation itself failed | retry or `rollback()` |
//! | `NoActiveTransaction`, `AnotherTransactionActive`, `UnknownResourceId` | API misuse | fix the caller |

#![warn(missing_docs)]

mod types;

pub mod prelude;

// Re-export main entry points
pub use txnguard_concurrency::{
    LockSnapshot, ManagerBuilder, ManagerOptions, TransactionManager, TransactionMetrics,
};
pub use txnguard_core::{Error, Result};

// Re-export types
pub use types::*;
