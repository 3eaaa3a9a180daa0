//! Contracts the transaction manager consumes
//!
//! The manager never looks inside a resource. It only needs:
//! - [`Resource`]: something with a stable [`ResourceId`]
//! - [`ResourceOperation`]: a reversible mutation of a resource
//! - [`TimeProvider`]: a non-decreasing clock for ordering transactions

use crate::error::ResourceOperationError;
use crate::types::{ResourceId, Timestamp};

/// A mutable entity managed by the transaction manager
///
/// Resources are handed to the manager at construction and live as long as it
/// does. They are only ever modified through [`ResourceOperation`]s executed
/// by the thread that currently owns them.
pub trait Resource: Send {
    /// Stable identifier of this resource
    fn id(&self) -> ResourceId;
}

/// A reversible mutation applied to a resource of type `R`
///
/// `undo` must invert a successful `execute`. Rollback calls `undo` in the
/// reverse order of execution, and only for executions that succeeded.
pub trait ResourceOperation<R>: Send {
    /// Apply the operation
    ///
    /// On error the resource must be left as it was; the manager does not
    /// record a failed operation in the undo log.
    fn execute(&self, resource: &mut R) -> Result<(), ResourceOperationError>;

    /// Revert a previous successful `execute`
    ///
    /// Expected to succeed. An error is logged and skipped by rollback, which
    /// carries on undoing the remaining operations.
    fn undo(&self, resource: &mut R) -> Result<(), ResourceOperationError>;
}

/// Source of transaction start timestamps
///
/// Must be non-decreasing across calls, from any thread. Equal values are
/// allowed.
pub trait TimeProvider: Send + Sync {
    /// Current time
    fn now(&self) -> Timestamp;
}
