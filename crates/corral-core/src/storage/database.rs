//! # SQLite Store
//!
//! A single file-backed (or in-memory) SQLite database holding one table per
//! resource kind plus the `relations` and `events` tables.
//!
//! - The connection is opened lazily and the schema script applied on open
//! - Every statement runs under the store mutex, so statements issued from
//!   different threads are never interleaved on the connection
//! - Every statement runs inside a `CriticalSection`, so an interrupt never
//!   lands in the middle of a write
//! - Table names passed to `get`/`all` are resource-kind constants, never
//!   user input

use super::session::{Session, SessionState};
use crate::config::Location;
use crate::critical::{CriticalSection, InterruptLatch};
use crate::primitives::SCHEMA_SCRIPT;
use crate::types::{CorralError, CorralResult, ResourceId, Timestamp, format_timestamp, now};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// How long a statement waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One row of a resource table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: ResourceId,
    pub date: String,
    pub enabled: bool,
    pub value: Vec<u8>,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            enabled: row.get(2)?,
            value: row.get(3)?,
        })
    }

    /// Parse the row's `date` column.
    pub fn timestamp(&self) -> CorralResult<Timestamp> {
        Ok(crate::types::parse_timestamp(&self.date)?)
    }
}

/// A named relational store.
pub struct Database {
    name: String,
    location: Location,
    connection: Mutex<Option<Connection>>,
    pub(super) session: Mutex<SessionState>,
    latch: Arc<InterruptLatch>,
    commits: AtomicU64,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("open", &self.is_open())
            .field("commits", &self.commit_count())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Create a store handle. Nothing is opened until first use.
    #[must_use]
    pub fn new(name: impl Into<String>, location: Location, latch: Arc<InterruptLatch>) -> Self {
        Self {
            name: name.into(),
            location,
            connection: Mutex::new(None),
            session: Mutex::new(SessionState::default()),
            latch,
            commits: AtomicU64::new(0),
        }
    }

    /// Name the store was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the store lives.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Check whether the connection has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// Open the connection and apply the schema, if not done yet.
    pub fn open(&self) -> CorralResult<()> {
        self.with_connection(|_| Ok(()))
    }

    /// Open a critical section on this store's latch.
    ///
    /// Taken before any store-internal lock, so a latched interrupt is
    /// delivered only after those locks are released.
    pub(crate) fn critical(&self) -> CriticalSection<'_> {
        self.latch.enter()
    }

    /// Number of physical `COMMIT`s issued on this store.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Enter a session scope on this store.
    ///
    /// Scopes nest; statements issued until the outermost scope closes are
    /// committed together.
    pub fn session(&self) -> CorralResult<Session<'_>> {
        Session::enter(self)
    }

    /// Run `f` inside a session scope.
    ///
    /// The scope closes normally when `f` succeeds and as failed when it
    /// returns an error.
    pub fn in_session<T>(
        &self,
        f: impl FnOnce(&Session<'_>) -> CorralResult<T>,
    ) -> CorralResult<T> {
        let session = self.session()?;
        match f(&session) {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(e) => {
                session.abort()?;
                Err(e)
            }
        }
    }

    /// Commit pending statements.
    ///
    /// Inside a session the commit is deferred to the outermost exit.
    pub fn commit(&self) -> CorralResult<()> {
        if self.session.lock().depth > 0 {
            trace!(store = %self.name, "commit deferred to outermost session exit");
            return Ok(());
        }
        self.physical_commit()
    }

    pub(super) fn begin(&self) -> CorralResult<()> {
        self.with_connection(|conn| conn.execute_batch("BEGIN"))
    }

    pub(super) fn physical_commit(&self) -> CorralResult<()> {
        let committed = self.with_connection(|conn| {
            if conn.is_autocommit() {
                return Ok(false);
            }
            conn.execute_batch("COMMIT").map(|()| true)
        })?;
        if committed {
            let total = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(store = %self.name, total, "committed");
        }
        Ok(())
    }

    pub(super) fn rollback(&self) -> CorralResult<()> {
        let rolled_back = self.with_connection(|conn| {
            if conn.is_autocommit() {
                return Ok(false);
            }
            conn.execute_batch("ROLLBACK").map(|()| true)
        })?;
        if rolled_back {
            debug!(store = %self.name, "failed batch rolled back");
        }
        Ok(())
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    /// Fetch one row of a resource table by identifier.
    pub fn get(&self, table: &str, id: &ResourceId) -> CorralResult<Option<StoredRow>> {
        let sql = format!("SELECT id, date, enabled, value FROM {table} WHERE id = ?1");
        self.with_connection(|conn| {
            conn.query_row(&sql, params![id], StoredRow::from_row)
                .optional()
        })
    }

    /// Fetch every row of a resource table, in storage order.
    pub fn all(&self, table: &str) -> CorralResult<Vec<StoredRow>> {
        let sql = format!("SELECT id, date, enabled, value FROM {table} ORDER BY rowid");
        self.query(&sql, [], StoredRow::from_row)
    }

    /// Insert a resource row, or replace the payload of an existing one.
    ///
    /// `date` and `enabled` keep the values of the first insert.
    pub fn upsert_resource(&self, table: &str, id: &ResourceId, value: &[u8]) -> CorralResult<()> {
        let sql = format!(
            "INSERT INTO {table}(id, date, enabled, value) VALUES (?1, ?2, 1, ?3) \
             ON CONFLICT (id) DO UPDATE SET value = excluded.value"
        );
        let date = format_timestamp(&now());
        self.execute(&sql, params![id, date, value])?;
        Ok(())
    }

    /// Set the `enabled` flag of a resource row. Returns whether a row matched.
    pub fn set_enabled(&self, table: &str, id: &ResourceId, enabled: bool) -> CorralResult<bool> {
        let sql = format!("UPDATE {table} SET enabled = ?1 WHERE id = ?2");
        Ok(self.execute(&sql, params![enabled, id])? > 0)
    }

    /// Execute one statement. Returns the number of changed rows.
    pub fn execute(&self, sql: &str, params: impl Params) -> CorralResult<usize> {
        self.with_connection(|conn| conn.execute(sql, params))
    }

    /// Execute one statement once per parameter set.
    pub fn execute_many<P: Params>(
        &self,
        sql: &str,
        rows: impl IntoIterator<Item = P>,
    ) -> CorralResult<usize> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let mut changed = 0;
            for params in rows {
                changed += stmt.execute(params)?;
            }
            Ok(changed)
        })
    }

    /// Execute a batch of `;`-separated statements.
    pub fn execute_script(&self, sql: &str) -> CorralResult<()> {
        self.with_connection(|conn| conn.execute_batch(sql))
    }

    /// Run a query and map every returned row.
    pub fn query<T, P, F>(&self, sql: &str, params: P, map: F) -> CorralResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params, map)?;
            rows.collect()
        })
    }

    /// Run a statement expected to return exactly one row.
    pub fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> CorralResult<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_connection(|conn| conn.query_row(sql, params, map))
    }

    // =========================================================================
    // CONNECTION
    // =========================================================================

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> CorralResult<T> {
        let _section = self.latch.enter();
        let mut guard = self.connection.lock();
        let conn = match &mut *guard {
            Some(conn) => conn,
            slot => slot.insert(self.connect()?),
        };
        Ok(f(conn)?)
    }

    fn connect(&self) -> CorralResult<Connection> {
        let conn = match &self.location {
            Location::Memory => Connection::open_in_memory()?,
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    create_private_dir(parent)?;
                }
                let conn = Connection::open(path)?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
                conn
            }
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA_SCRIPT)?;
        debug!(store = %self.name, location = %self.location, "store opened");
        Ok(conn)
    }
}

fn create_private_dir(dir: &std::path::Path) -> CorralResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CorralError::Io(format!("Cannot create '{}': {}", dir.display(), e)))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| CorralError::Io(format!("Cannot restrict '{}': {}", dir.display(), e)))?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
