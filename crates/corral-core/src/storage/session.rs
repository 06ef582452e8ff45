//! # Sessions
//!
//! Reference-counted transaction scopes over one store.
//!
//! Scopes nest. Entering the first scope issues `BEGIN`; every later
//! `Database::commit` is deferred. When the outermost scope exits, the batch
//! is committed if every scope closed normally and rolled back otherwise.
//!
//! A scope closes normally only through `Session::close`. Dropping a
//! `Session` without closing it (early return via `?`, panic) marks the whole
//! batch as failed. Closing the outermost scope of a failed batch reports the
//! rollback as an error.

use super::database::Database;
use crate::types::{CorralError, CorralResult};
use std::ops::Deref;
use tracing::warn;

/// Shared counter behind the session scopes of one store.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) depth: usize,
    failed: bool,
}

/// An open session scope.
///
/// Derefs to the store, so statements can be issued through the session.
#[derive(Debug)]
#[must_use = "dropping a session without `close` rolls back the batch"]
pub struct Session<'a> {
    database: &'a Database,
    closed: bool,
}

impl<'a> Session<'a> {
    pub(super) fn enter(database: &'a Database) -> CorralResult<Self> {
        let _section = database.critical();
        let mut state = database.session.lock();
        if state.depth == 0 {
            database.begin()?;
            state.failed = false;
        }
        state.depth += 1;
        Ok(Self {
            database,
            closed: false,
        })
    }

    /// The store this session runs on.
    #[must_use]
    pub fn database(&self) -> &'a Database {
        self.database
    }

    /// Current nesting depth of the store's sessions.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.database.session.lock().depth
    }

    /// Close the scope normally.
    ///
    /// Commits the batch if this was the outermost scope and no scope failed.
    /// If another scope of the batch failed, the outermost close rolls back
    /// and returns `CorralError::Storage`.
    pub fn close(mut self) -> CorralResult<()> {
        self.closed = true;
        exit(self.database, false)
    }

    /// Close the scope as failed. The batch is rolled back at the outermost exit.
    pub fn abort(mut self) -> CorralResult<()> {
        self.closed = true;
        exit(self.database, true)
    }
}

impl Deref for Session<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.database
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = exit(self.database, true) {
            warn!(store = %self.database.name(), error = %e, "failed to unwind session");
        }
    }
}

fn exit(database: &Database, failed: bool) -> CorralResult<()> {
    let _section = database.critical();
    let mut state = database.session.lock();
    state.failed |= failed || std::thread::panicking();
    state.depth = state.depth.saturating_sub(1);
    if state.depth > 0 {
        return Ok(());
    }
    if !std::mem::take(&mut state.failed) {
        return database.physical_commit();
    }
    database.rollback()?;
    if failed {
        Ok(())
    } else {
        Err(CorralError::Storage(format!(
            "batch on store '{}' rolled back: an inner scope failed",
            database.name()
        )))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::config::Location;
    use crate::critical::InterruptLatch;
    use crate::storage::Database;
    use crate::types::{CorralError, ResourceId, ResourceType};

    fn memory_db() -> Database {
        Database::new("resources", Location::Memory, InterruptLatch::new())
    }

    fn insert(db: &Database) -> ResourceId {
        let id = ResourceId::make(ResourceType::Cluster);
        db.upsert_resource("clusters", &id, b"x").expect("insert");
        db.commit().expect("commit");
        id
    }

    #[test]
    fn nested_sessions_commit_once_at_outermost_exit() {
        let db = memory_db();
        let outer = db.session().expect("outer");
        {
            let inner = db.session().expect("inner");
            assert_eq!(inner.depth(), 2);
            insert(&inner);
            insert(&inner);
            inner.close().expect("close inner");
        }
        assert_eq!(db.commit_count(), 0);

        outer.close().expect("close outer");
        assert_eq!(db.commit_count(), 1);
        assert_eq!(db.all("clusters").expect("all").len(), 2);
    }

    #[test]
    fn dropped_inner_session_rolls_back_whole_batch() {
        let db = memory_db();
        let outer = db.session().expect("outer");
        insert(&outer);
        {
            let inner = db.session().expect("inner");
            insert(&inner);
            drop(inner);
        }
        let err = outer.close().expect_err("batch was rolled back");
        assert!(matches!(err, CorralError::Storage(ref msg) if msg.contains("rolled back")));

        assert_eq!(db.commit_count(), 0);
        assert!(db.all("clusters").expect("all").is_empty());
    }

    #[test]
    fn in_session_rolls_back_on_error() {
        let db = memory_db();
        let result: Result<(), CorralError> = db.in_session(|s| {
            insert(s);
            Err(CorralError::Storage("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(db.all("clusters").expect("all").is_empty());
    }

    #[test]
    fn aborted_outer_session_reports_no_error() {
        let db = memory_db();
        let outer = db.session().expect("outer");
        insert(&outer);
        outer.abort().expect("abort is the caller's own decision");
        assert!(db.all("clusters").expect("all").is_empty());
    }

    #[test]
    fn in_session_reports_rollback_caused_by_inner_scope() {
        let db = memory_db();
        let result = db.in_session(|s| {
            insert(s);
            let inner = db.session()?;
            inner.abort()?;
            Ok(())
        });

        assert!(matches!(result, Err(CorralError::Storage(_))));
        assert!(db.all("clusters").expect("all").is_empty());
    }

    #[test]
    fn new_batch_starts_clean_after_rollback() {
        let db = memory_db();
        db.session().expect("failed").abort().expect("abort");

        let id = db.in_session(|s| Ok(insert(s))).expect("batch");
        assert!(db.get("clusters", &id).expect("get").is_some());
        assert_eq!(db.commit_count(), 1);
    }
}
