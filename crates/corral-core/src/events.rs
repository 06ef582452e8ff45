//! # Status Event Log
//!
//! Append-only log of status entries, kept in the `events` store so the
//! history of a resource survives even when its row is rewritten.

use crate::primitives::EVENTS_TABLE;
use crate::resource::ResourceStatus;
use crate::storage::Database;
use crate::types::{
    CorralResult, ResourceId, ResourceType, Status, format_timestamp, parse_timestamp,
};
use rusqlite::params;
use std::sync::Arc;

/// One logged status entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Monotonic sequence number.
    pub seq: i64,
    pub resource: ResourceId,
    pub resource_type: ResourceType,
    pub status: ResourceStatus,
}

/// Handle on the event store.
#[derive(Debug, Clone)]
pub struct EventLog {
    database: Arc<Database>,
}

type EventColumns = (
    i64,
    ResourceId,
    ResourceType,
    String,
    Status,
    Option<String>,
    Option<ResourceId>,
    String,
);

impl EventLog {
    #[must_use]
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Append one entry and commit.
    pub fn record(
        &self,
        resource: &ResourceId,
        kind: ResourceType,
        status: &ResourceStatus,
    ) -> CorralResult<()> {
        let sql = format!(
            "INSERT INTO {EVENTS_TABLE}(resource, resource_type, key, value, description, reason, date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        );
        self.database.execute(
            &sql,
            params![
                resource,
                kind,
                status.key,
                status.value,
                status.description,
                status.reason,
                format_timestamp(&status.date),
            ],
        )?;
        self.database.commit()
    }

    /// Every entry logged for `resource`, oldest first.
    pub fn history(&self, resource: &ResourceId) -> CorralResult<Vec<Event>> {
        let sql = format!(
            "SELECT id, resource, resource_type, key, value, description, reason, date \
             FROM {EVENTS_TABLE} WHERE resource = ?1 ORDER BY id"
        );
        let rows: Vec<EventColumns> = self.database.query(&sql, params![resource], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?;
        rows.into_iter()
            .map(|(seq, resource, resource_type, key, value, description, reason, date)| {
                Ok(Event {
                    seq,
                    resource,
                    resource_type,
                    status: ResourceStatus {
                        key,
                        value,
                        description,
                        reason,
                        date: parse_timestamp(&date)?,
                    },
                })
            })
            .collect()
    }

    /// Total number of logged entries.
    pub fn len(&self) -> CorralResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {EVENTS_TABLE}");
        let count: i64 = self.database.query_one(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> CorralResult<bool> {
        Ok(self.len()? == 0)
    }
}
