//! # Relations
//!
//! Typed, directed edges between resources, stored in the `relations` table
//! of the resources store.
//!
//! The triple `(origin, relation, destination)` is unique. Asserting an edge
//! that already exists replaces its `value` and `date` and keeps its
//! identifier; it never adds a row. Edges are never deleted.

use crate::formats::{Record, record_from_bytes, record_to_bytes};
use crate::primitives::RELATIONS_TABLE;
use crate::resource::LiveResource;
use crate::storage::Database;
use crate::types::{
    CorralResult, RelationType, ResourceId, ResourceType, Timestamp, format_timestamp, now,
    parse_timestamp,
};
use rusqlite::{Row, params, params_from_iter};
use std::sync::Arc;

const COLUMNS: &str = "id, origin_type, origin, relation, destination_type, destination, date, value";

// =============================================================================
// ROWS & FILTERS
// =============================================================================

/// One stored edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRow {
    pub id: ResourceId,
    pub origin_type: ResourceType,
    pub origin: ResourceId,
    pub relation: RelationType,
    pub destination_type: ResourceType,
    pub destination: ResourceId,
    pub date: Timestamp,
    pub value: Record,
}

type RawRow = (
    ResourceId,
    ResourceType,
    ResourceId,
    RelationType,
    ResourceType,
    ResourceId,
    String,
    Vec<u8>,
);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
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
}

impl RelationRow {
    fn from_raw(raw: RawRow) -> CorralResult<Self> {
        let (id, origin_type, origin, relation, destination_type, destination, date, value) = raw;
        Ok(Self {
            id,
            origin_type,
            origin,
            relation,
            destination_type,
            destination,
            date: parse_timestamp(&date)?,
            value: record_from_bytes(&value)?,
        })
    }
}

/// Conjunctive filter over stored edges. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationFilter {
    pub origin_type: Option<ResourceType>,
    pub origin: Option<ResourceId>,
    pub destination_type: Option<ResourceType>,
    pub destination: Option<ResourceId>,
    pub relation: Option<RelationType>,
}

impl RelationFilter {
    /// Filter matching every edge.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn origin_type(mut self, kind: ResourceType) -> Self {
        self.origin_type = Some(kind);
        self
    }

    #[must_use]
    pub fn origin(mut self, id: ResourceId) -> Self {
        self.origin = Some(id);
        self
    }

    #[must_use]
    pub fn destination_type(mut self, kind: ResourceType) -> Self {
        self.destination_type = Some(kind);
        self
    }

    #[must_use]
    pub fn destination(mut self, id: ResourceId) -> Self {
        self.destination = Some(id);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: RelationType) -> Self {
        self.relation = Some(relation);
        self
    }

    /// `WHERE` clause (empty when nothing is set) and its bound values.
    fn to_sql(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        let text = [
            ("origin_type", self.origin_type.map(|k| k.as_str().to_string())),
            ("origin", self.origin.as_ref().map(ToString::to_string)),
            ("destination_type", self.destination_type.map(|k| k.as_str().to_string())),
            ("destination", self.destination.as_ref().map(ToString::to_string)),
            ("relation", self.relation.map(|r| r.as_str().to_string())),
        ];
        for (column, value) in text {
            if let Some(value) = value {
                conditions.push(format!("{column} = ?"));
                values.push(value);
            }
        }
        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Creates and queries edges on one store.
#[derive(Debug, Clone)]
pub struct RelationsManager {
    database: Arc<Database>,
}

impl RelationsManager {
    #[must_use]
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Assert an edge between two live resources.
    pub fn create(
        &self,
        origin: &dyn LiveResource,
        relation: RelationType,
        destination: &dyn LiveResource,
        value: Option<Record>,
    ) -> CorralResult<RelationRow> {
        self.create_full(
            origin.kind(),
            origin.id(),
            relation,
            destination.kind(),
            destination.id(),
            value,
        )
    }

    /// Assert an edge given explicit endpoint kinds and identifiers.
    ///
    /// Returns the stored row; for an existing edge that is the row with its
    /// original identifier.
    pub fn create_full(
        &self,
        origin_type: ResourceType,
        origin: &ResourceId,
        relation: RelationType,
        destination_type: ResourceType,
        destination: &ResourceId,
        value: Option<Record>,
    ) -> CorralResult<RelationRow> {
        let edge = Edge {
            id: ResourceId::make(ResourceType::Relation),
            origin_type,
            origin,
            relation,
            destination_type,
            destination,
        };
        let row = upsert_edge(&self.database, &edge, &value.unwrap_or_default())?;
        self.database.commit()?;
        Ok(row)
    }

    /// Every edge matching `filter`, in storage order.
    pub fn get(&self, filter: &RelationFilter) -> CorralResult<Vec<RelationRow>> {
        let (clause, values) = filter.to_sql();
        let sql = format!("SELECT {COLUMNS} FROM {RELATIONS_TABLE}{clause} ORDER BY rowid");
        self.database
            .query(&sql, params_from_iter(values.iter()), raw_row)?
            .into_iter()
            .map(RelationRow::from_raw)
            .collect()
    }

    /// Number of edges matching `filter`.
    pub fn count(&self, filter: &RelationFilter) -> CorralResult<u64> {
        let (clause, values) = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM {RELATIONS_TABLE}{clause}");
        let count: i64 =
            self.database
                .query_one(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

/// Endpoints of an edge about to be written.
pub(crate) struct Edge<'a> {
    pub(crate) id: ResourceId,
    pub(crate) origin_type: ResourceType,
    pub(crate) origin: &'a ResourceId,
    pub(crate) relation: RelationType,
    pub(crate) destination_type: ResourceType,
    pub(crate) destination: &'a ResourceId,
}

/// Insert an edge or refresh the existing one. Does not commit.
pub(crate) fn upsert_edge(
    database: &Database,
    edge: &Edge<'_>,
    value: &Record,
) -> CorralResult<RelationRow> {
    let sql = format!(
        "INSERT INTO {RELATIONS_TABLE}({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT (origin, relation, destination) \
         DO UPDATE SET value = excluded.value, date = excluded.date \
         RETURNING {COLUMNS}"
    );
    let raw = database.query_one(
        &sql,
        params![
            edge.id,
            edge.origin_type,
            edge.origin,
            edge.relation,
            edge.destination_type,
            edge.destination,
            format_timestamp(&now()),
            record_to_bytes(value)?,
        ],
        raw_row,
    )?;
    RelationRow::from_raw(raw)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Location;
    use crate::critical::InterruptLatch;
    use crate::formats::Encoded;

    fn manager() -> RelationsManager {
        RelationsManager::new(Arc::new(Database::new(
            "resources",
            Location::Memory,
            InterruptLatch::new(),
        )))
    }

    fn id(kind: ResourceType) -> ResourceId {
        ResourceId::make(kind)
    }

    #[test]
    fn reasserting_edge_keeps_id_and_updates_value() {
        let relations = manager();
        let (pod, node) = (id(ResourceType::Pod), id(ResourceType::Node));

        let first = relations
            .create_full(ResourceType::Pod, &pod, RelationType::BelongsTo, ResourceType::Node, &node, None)
            .expect("create");
        let mut value = Record::new();
        value.insert("weight".to_string(), Encoded::Int(3));
        let second = relations
            .create_full(
                ResourceType::Pod,
                &pod,
                RelationType::BelongsTo,
                ResourceType::Node,
                &node,
                Some(value.clone()),
            )
            .expect("re-create");

        assert_eq!(second.id, first.id);
        assert_eq!(second.value, value);
        assert!(first.value.is_empty());
        assert_eq!(relations.count(&RelationFilter::any()).expect("count"), 1);
    }

    #[test]
    fn different_relation_type_is_a_new_edge() {
        let relations = manager();
        let (a, b) = (id(ResourceType::Pod), id(ResourceType::Application));
        for relation in RelationType::ALL {
            relations
                .create_full(ResourceType::Pod, &a, *relation, ResourceType::Application, &b, None)
                .expect("create");
        }
        assert_eq!(relations.count(&RelationFilter::any()).expect("count"), 2);
    }

    #[test]
    fn filters_are_conjunctive() {
        let relations = manager();
        let node = id(ResourceType::Node);
        let cluster = id(ResourceType::Cluster);
        let ips = [id(ResourceType::IpAddress), id(ResourceType::IpAddress)];
        for ip in &ips {
            relations
                .create_full(ResourceType::IpAddress, ip, RelationType::BelongsTo, ResourceType::Node, &node, None)
                .expect("ip -> node");
        }
        relations
            .create_full(ResourceType::Node, &node, RelationType::BelongsTo, ResourceType::Cluster, &cluster, None)
            .expect("node -> cluster");

        let to_node = relations
            .get(&RelationFilter::any().destination(node.clone()))
            .expect("get");
        assert_eq!(to_node.len(), 2);
        assert_eq!(to_node[0].origin, ips[0]);

        let from_node = relations
            .get(
                &RelationFilter::any()
                    .origin(node)
                    .destination_type(ResourceType::Cluster)
                    .relation(RelationType::BelongsTo),
            )
            .expect("get");
        assert_eq!(from_node.len(), 1);
        assert_eq!(from_node[0].destination, cluster);

        let none = RelationFilter::any()
            .origin_type(ResourceType::Pod)
            .relation(RelationType::IsA);
        assert!(relations.get(&none).expect("get").is_empty());
    }

    #[test]
    fn empty_filter_renders_no_where_clause() {
        let (clause, values) = RelationFilter::any().to_sql();
        assert!(clause.is_empty());
        assert!(values.is_empty());
    }
}
