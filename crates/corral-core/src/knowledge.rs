//! # Knowledge Base
//!
//! In-memory index of every live resource, keyed by identifier.
//!
//! The knowledge base holds shared handles and provides lookup only; each
//! handle owns its own lock and its own row. Entries are never evicted except
//! by `clear` or `remove`.

use crate::resource::{LiveResource, Persistent, Resource};
use crate::types::{CorralError, CorralResult, ResourceId, ResourceType, ValidationError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared index of live resources.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    entries: RwLock<BTreeMap<ResourceId, Arc<dyn LiveResource>>>,
}

impl KnowledgeBase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resource by identifier.
    pub fn get(&self, id: &ResourceId) -> CorralResult<Arc<dyn LiveResource>> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CorralError::ResourceNotFound(id.to_string()))
    }

    /// Look up a resource and check that it is of kind `R`.
    pub fn get_as<R: Resource>(&self, id: &ResourceId) -> CorralResult<Arc<Persistent<R>>> {
        let live = self.get(id)?;
        let kind = live.kind();
        live.as_any()
            .downcast::<Persistent<R>>()
            .map_err(|_| ValidationError::mismatch("id", R::KIND.as_str(), kind.as_str()).into())
    }

    /// Insert or replace the entry for `id`. Last writer wins.
    pub fn set(&self, id: ResourceId, resource: Arc<dyn LiveResource>) {
        self.entries.write().insert(id, resource);
    }

    /// Drop the entry for `id`, returning it if present.
    pub fn remove(&self, id: &ResourceId) -> Option<Arc<dyn LiveResource>> {
        self.entries.write().remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.read().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Every identifier, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<ResourceId> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of live resources per kind.
    #[must_use]
    pub fn census(&self) -> BTreeMap<ResourceType, usize> {
        let mut counts = BTreeMap::new();
        for live in self.entries.read().values() {
            *counts.entry(live.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Every live resource of kind `R`.
    #[must_use]
    pub fn of_kind<R: Resource>(&self) -> Vec<Arc<Persistent<R>>> {
        self.snapshot()
            .into_iter()
            .filter(|live| live.kind() == R::KIND)
            .filter_map(|live| live.as_any().downcast::<Persistent<R>>().ok())
            .collect()
    }

    /// Forget every entry. Rows in the store are untouched.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Flush every live resource to its store.
    ///
    /// Entries are kept. Every resource is attempted; the first failure is
    /// returned after the rest have been flushed.
    pub fn shutdown(&self) -> CorralResult<()> {
        let live = self.snapshot();
        debug!(count = live.len(), "flushing knowledge base");
        let mut first_error = None;
        for resource in live {
            if let Err(e) = resource.flush() {
                warn!(id = %resource.id(), error = %e, "failed to flush resource");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn snapshot(&self) -> Vec<Arc<dyn LiveResource>> {
        self.entries.read().values().cloned().collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
