//! Registry of named stores.

use super::database::Database;
use super::session::Session;
use crate::config::StoreConfig;
use crate::critical::InterruptLatch;
use crate::types::{CorralError, CorralResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Every store known to a `Corral` context, by name.
///
/// Stores are registered up front from a `StoreConfig` and opened lazily.
#[derive(Debug)]
pub struct Persistency {
    databases: BTreeMap<String, Arc<Database>>,
}

impl Persistency {
    /// Register one store per configured name.
    #[must_use]
    pub fn new(config: &StoreConfig, latch: &Arc<InterruptLatch>) -> Self {
        let databases = config
            .databases
            .iter()
            .map(|name| {
                let db = Database::new(name.clone(), config.location(name), Arc::clone(latch));
                (name.clone(), Arc::new(db))
            })
            .collect();
        Self { databases }
    }

    /// Look up a store by name.
    pub fn database(&self, name: &str) -> CorralResult<&Arc<Database>> {
        self.databases
            .get(name)
            .ok_or_else(|| CorralError::DatabaseNotFound(name.to_string()))
    }

    /// Enter a session scope on the named store.
    pub fn session(&self, name: &str) -> CorralResult<Session<'_>> {
        self.database(name)?.session()
    }

    /// Open every registered store.
    pub fn open_all(&self) -> CorralResult<()> {
        self.databases.values().try_for_each(|db| db.open())
    }

    /// Names of the registered stores.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }
}
