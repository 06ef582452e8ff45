//! Live handles on registered resources.
//!
//! A `Persistent<R>` is what the knowledge base stores and what factories
//! return. It owns the per-instance lock: a mutation runs on a copy of the
//! state, is validated and written to the store, and only then replaces the
//! state. A rejected mutation leaves both the handle and the row untouched.

use super::{Resource, ResourceStatus};
use crate::events::EventLog;
use crate::formats::Record;
use crate::storage::Database;
use crate::types::{CorralResult, ResourceId, ResourceType};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Object-safe view of any registered resource.
pub trait LiveResource: Send + Sync + fmt::Debug {
    fn id(&self) -> &ResourceId;

    fn kind(&self) -> ResourceType;

    fn name(&self) -> String;

    /// Canonical field record of the current state.
    fn record(&self) -> Record;

    /// Write the current state to the store and commit.
    fn flush(&self) -> CorralResult<()>;

    /// Upcast for typed downcasting.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A registered resource bound to its store.
pub struct Persistent<R: Resource> {
    id: ResourceId,
    state: Mutex<R>,
    database: Arc<Database>,
    events: EventLog,
}

impl<R: Resource> fmt::Debug for Persistent<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistent")
            .field("kind", &R::KIND)
            .field("state", &*self.state.lock())
            .field("store", &self.database.name())
            .finish_non_exhaustive()
    }
}

impl<R: Resource> Persistent<R> {
    pub(crate) fn new(resource: R, database: Arc<Database>, events: EventLog) -> Self {
        Self {
            id: resource.id().clone(),
            state: Mutex::new(resource),
            database,
            events,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> R {
        self.state.lock().clone()
    }

    /// Run `f` on the current state under the instance lock.
    pub fn read<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.state.lock())
    }

    /// Apply a mutation, validate it and commit it.
    ///
    /// On any error the previous state is kept.
    pub fn update(&self, f: impl FnOnce(&mut R)) -> CorralResult<()> {
        self.update_then(f, || Ok(()))
    }

    /// Apply a mutation and run `then` in the same batch as the row write.
    ///
    /// If `then` fails the row write is rolled back with it.
    fn update_then(
        &self,
        f: impl FnOnce(&mut R),
        then: impl FnOnce() -> CorralResult<()>,
    ) -> CorralResult<()> {
        let _section = self.database.critical();
        let mut state = self.state.lock();
        let mut next = state.clone();
        f(&mut next);
        next.validate()?;
        self.database.in_session(|_| {
            next.persist(&self.database)?;
            then()
        })?;
        *state = next;
        Ok(())
    }

    /// Write the current state and commit.
    pub fn commit(&self) -> CorralResult<()> {
        let _section = self.database.critical();
        let state = self.state.lock();
        state.persist(&self.database)?;
        self.database.commit()
    }

    pub fn set_name(&self, name: impl Into<String>) -> CorralResult<()> {
        let name = name.into();
        self.update(|r| r.base_mut().name = name)
    }

    pub fn set_description(&self, description: Option<&str>) -> CorralResult<()> {
        self.update(|r| r.base_mut().description = description.map(str::to_string))
    }

    /// Append a status entry, commit it and log it to the event store.
    ///
    /// If the event cannot be logged the entry is not kept.
    pub fn push_status(&self, status: ResourceStatus) -> CorralResult<()> {
        let logged = status.clone();
        self.update_then(
            |r| r.base_mut().status.push(status),
            || self.events.record(&self.id, R::KIND, &logged),
        )
    }

    /// Most recent status entry.
    #[must_use]
    pub fn latest_status(&self) -> Option<ResourceStatus> {
        self.read(|r| r.base().latest_status().cloned())
    }
}

impl<R: Resource> LiveResource for Persistent<R> {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn kind(&self) -> ResourceType {
        R::KIND
    }

    fn name(&self) -> String {
        self.read(|r| r.name().to_string())
    }

    fn record(&self) -> Record {
        self.read(R::to_record)
    }

    fn flush(&self) -> CorralResult<()> {
        self.commit()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
