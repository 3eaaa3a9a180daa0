//! Core identifier types for the transaction manager
//!
//! This module defines the identifiers used throughout the system:
//! - [`TxnId`]: Identity of the calling thread, doubling as its transaction id
//! - [`ResourceId`]: Opaque, cheaply clonable name of a managed resource
//! - [`Timestamp`]: Start time used to order transactions

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Start time of a transaction
///
/// Only used to order transactions ("older" < "newer"). Two transactions may
/// share a timestamp; ties are broken by [`TxnId`].
pub type Timestamp = u64;

/// Process-wide source of thread identities. Zero is never handed out.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Identity of a thread and of the (at most one) transaction it drives
///
/// Every thread gets a stable integer the first time it asks for one. The
/// value is used as the registry key, as the owner recorded in the lock table,
/// and as the tie-breaker in victim selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(u64);

impl TxnId {
    /// Identity of the calling thread
    ///
    /// # Examples
    ///
    /// ```
    /// use txnguard_core::TxnId;
    ///
    /// let a = TxnId::current();
    /// let b = TxnId::current();
    /// assert_eq!(a, b); // stable for the lifetime of the thread
    /// ```
    pub fn current() -> Self {
        CURRENT_THREAD_ID.with(|cell| {
            let mut id = cell.get();
            if id == 0 {
                id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
                cell.set(id);
            }
            TxnId(id)
        })
    }

    /// Wrap a raw identifier
    ///
    /// Intended for tests and diagnostics that need synthetic identities; the
    /// manager itself only ever uses [`TxnId::current`].
    pub const fn from_raw(id: u64) -> Self {
        TxnId(id)
    }

    /// Raw integer value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Identifier of a managed resource
///
/// Equality-comparable and hashable; cloning is a reference count bump.
///
/// # Examples
///
/// ```
/// use txnguard_core::ResourceId;
///
/// let a = ResourceId::new("accounts");
/// assert_eq!(a, ResourceId::from("accounts"));
/// assert_eq!(a.as_str(), "accounts");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(Arc<str>);

impl ResourceId {
    /// Create a resource id from any string-like name
    pub fn new(name: impl AsRef<str>) -> Self {
        ResourceId(Arc::from(name.as_ref()))
    }

    /// Borrow the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        ResourceId::new(name)
    }
}

impl From<String> for ResourceId {
    fn from(name: String) -> Self {
        ResourceId(Arc::from(name))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
