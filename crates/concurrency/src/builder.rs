//! Manager construction and options
//!
//! ```ignore
//! use txnguard_concurrency::ManagerBuilder;
//!
//! let manager = ManagerBuilder::new()
//!     .resources(accounts)
//!     .time_provider(Arc::new(ManualTimeProvider::new(0)))
//!     .name("ledger")
//!     .build()?;
//! ```

use crate::manager::TransactionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use txnguard_core::{Resource, Result, SystemTimeProvider, TimeProvider};

/// Options for a transaction manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    /// Label attached to this manager's tracing events
    pub name: String,
}

impl ManagerOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tracing label
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            name: "txnguard".to_string(),
        }
    }
}

/// Builder for [`TransactionManager`]
///
/// Resource ids must be unique; [`build`](ManagerBuilder::build) rejects
/// duplicates. Without an explicit time provider the manager uses
/// [`SystemTimeProvider`].
pub struct ManagerBuilder<R> {
    resources: Vec<R>,
    clock: Option<Arc<dyn TimeProvider>>,
    options: ManagerOptions,
}

impl<R: Resource + 'static> ManagerBuilder<R> {
    /// Create a builder with no resources and default options
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            clock: None,
            options: ManagerOptions::default(),
        }
    }

    /// Add one resource
    pub fn resource(mut self, resource: R) -> Self {
        self.resources.push(resource);
        self
    }

    /// Add several resources
    pub fn resources(mut self, resources: impl IntoIterator<Item = R>) -> Self {
        self.resources.extend(resources);
        self
    }

    /// Use `clock` for transaction start timestamps
    pub fn time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the tracing label
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    /// Replace all options
    pub fn options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the manager
    pub fn build(self) -> Result<TransactionManager<R>> {
        let clock: Arc<dyn TimeProvider> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemTimeProvider::new()),
        };
        TransactionManager::with_options(self.resources, clock, self.options)
    }
}

impl<R: Resource + 'static> Default for ManagerBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
