//! Core types and contracts for txnguard
//!
//! This crate defines the vocabulary shared by the transaction manager and
//! its callers:
//! - Identifiers: [`TxnId`], [`ResourceId`], [`Timestamp`]
//! - Contracts: [`Resource`], [`ResourceOperation`], [`TimeProvider`]
//! - Clocks: [`SystemTimeProvider`], [`ManualTimeProvider`]
//! - Errors: [`Error`], [`ResourceOperationError`], [`Result`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{Error, ResourceOperationError, Result};
pub use time::{ManualTimeProvider, SystemTimeProvider};
pub use traits::{Resource, ResourceOperation, TimeProvider};
pub use types::{ResourceId, Timestamp, TxnId};
