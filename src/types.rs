//! Public types for the txnguard API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Identifiers
pub use txnguard_core::{ResourceId, Timestamp, TxnId};

// Contracts implemented by callers
pub use txnguard_core::{Resource, ResourceOperation, TimeProvider};

// Clocks
pub use txnguard_core::{ManualTimeProvider, SystemTimeProvider};

// Operation failures
pub use txnguard_core::ResourceOperationError;
