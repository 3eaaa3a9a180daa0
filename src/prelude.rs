//! Convenient imports for txnguard.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use txnguard::prelude::*;
//!
//! let manager = TransactionManager::builder().resources(resources).build()?;
//! manager.begin()?;
//! ```

// Main entry point
pub use crate::{ManagerBuilder, ManagerOptions, TransactionManager};

// Error handling
pub use crate::{Error, Result};

// Core types
pub use crate::types::{ResourceId, Timestamp, TxnId};

// Contracts
pub use crate::types::{Resource, ResourceOperation, ResourceOperationError, TimeProvider};

// Clocks
pub use crate::types::{ManualTimeProvider, SystemTimeProvider};

// Shared ownership of the manager across threads
pub use std::sync::Arc;
