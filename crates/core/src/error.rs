//! Error types for the transaction manager
//!
//! Every failure surfaced by the manager maps to exactly one [`Error`]
//! variant. The taxonomy:
//!
//! | Variant | Kind | Transaction state afterwards |
//! |---------|------|------------------------------|
//! | AnotherTransactionActive | API misuse | unchanged |
//! | NoActiveTransaction | API misuse | unchanged |
//! | UnknownResourceId | API misuse | unchanged |
//! | ActiveTransactionAborted | deadlock victim | ABORTED, caller must roll back |
//! | Interrupted | deadlock victim, woken while waiting | ABORTED, caller must roll back |
//! | ResourceOperation | failure inside `execute` | ONGOING, resource still held |
//! | DuplicateResourceId | construction | manager not built |

use crate::types::ResourceId;
use thiserror::Error;

/// Failure reported by a resource operation
///
/// Returned by [`ResourceOperation::execute`](crate::ResourceOperation::execute)
/// and, exceptionally, by `undo`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResourceOperationError {
    message: String,
}

impl ResourceOperationError {
    /// Create an error with a human-readable message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message supplied by the operation
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// All transaction manager errors
#[derive(Debug, Error)]
pub enum Error {
    /// The calling thread already has a live transaction (ongoing or aborted)
    #[error("another transaction is already active on this thread")]
    AnotherTransactionActive,

    /// The calling thread has no transaction
    #[error("no active transaction on this thread")]
    NoActiveTransaction,

    /// The resource is not managed by this manager
    #[error("unknown resource id: {0}")]
    UnknownResourceId(ResourceId),

    /// The calling thread's transaction was chosen as a deadlock victim
    #[error("active transaction was aborted")]
    ActiveTransactionAborted,

    /// A resource operation failed; the transaction is still ongoing
    #[error("operation on resource {resource} failed: {source}")]
    ResourceOperation {
        /// Resource the operation was applied to
        resource: ResourceId,
        /// Error reported by the operation
        #[source]
        source: ResourceOperationError,
    },

    /// The blocking wait for a resource was cancelled by the deadlock detector
    #[error("interrupted while waiting for a resource")]
    Interrupted,

    /// Two resources share the same id
    #[error("duplicate resource id: {0}")]
    DuplicateResourceId(ResourceId),
}

/// Result type for transaction manager operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error reports API misuse
    ///
    /// Misuse errors leave the transaction state unchanged.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Error::AnotherTransactionActive
                | Error::NoActiveTransaction
                | Error::UnknownResourceId(_)
                | Error::DuplicateResourceId(_)
        )
    }

    /// Check if this error means the transaction lost a deadlock
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::ActiveTransactionAborted | Error::Interrupted)
    }

    /// Check if the caller must roll back before doing anything else
    ///
    /// True for deadlock aborts only; a failed resource operation leaves the
    /// choice between retrying and rolling back to the caller.
    pub fn requires_rollback(&self) -> bool {
        self.is_abort()
    }

    /// Check if this is a pass-through failure from a resource operation
    pub fn is_resource_error(&self) -> bool {
        matches!(self, Error::ResourceOperation { .. })
    }
}
