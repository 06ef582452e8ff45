//! Reified relations.
//!
//! A `Relation` resource is an edge with a name, description and status
//! history of its own. Its row lives in the `relations` table, so the same
//! uniqueness rule applies as for edges asserted through the
//! `RelationsManager`: persisting a relation whose triple already exists
//! refreshes the stored edge instead of adding one.

use super::{Persistent, Resource, ResourceBase, Validate};
use crate::context::Corral;
use crate::formats::{Encode, Fields, Record};
use crate::relations::{Edge, upsert_edge};
use crate::storage::Database;
use crate::types::{
    CorralResult, RelationType, ResourceId, ResourceType, ValidationError,
};
use std::sync::Arc;

/// A typed, directed edge between two resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub base: ResourceBase,
    pub origin: ResourceId,
    pub relation: RelationType,
    pub destination: ResourceId,
    pub value: Record,
}

impl Relation {
    pub fn new(
        name: impl Into<String>,
        origin: ResourceId,
        relation: RelationType,
        destination: ResourceId,
        value: Option<Record>,
        description: Option<&str>,
    ) -> Self {
        Self {
            base: ResourceBase::new(ResourceType::Relation, name, description),
            origin,
            relation,
            destination,
            value: value.unwrap_or_default(),
        }
    }

    pub fn make(
        corral: &Corral,
        name: &str,
        origin: &ResourceId,
        relation: RelationType,
        destination: &ResourceId,
        value: Option<Record>,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register(Self::new(
            name,
            origin.clone(),
            relation,
            destination.clone(),
            value,
            description,
        ))
    }
}

/// Endpoint kind, read from the identifier prefix.
fn endpoint_kind(id: &ResourceId, field: &str) -> Result<ResourceType, ValidationError> {
    id.kind().ok_or_else(|| ValidationError::Malformed {
        field: field.to_string(),
        reason: format!("'{id}' does not name a known resource kind"),
    })
}

impl Validate for Relation {
    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        endpoint_kind(&self.origin, "_origin")?;
        endpoint_kind(&self.destination, "_destination")?;
        Ok(())
    }
}

impl Resource for Relation {
    const KIND: ResourceType = ResourceType::Relation;

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn encode_fields(&self, record: &mut Record) {
        record.insert("_origin".to_string(), self.origin.encode());
        record.insert("_relation".to_string(), self.relation.encode());
        record.insert("_destination".to_string(), self.destination.encode());
        record.insert("_value".to_string(), self.value.encode());
    }

    fn decode_fields(base: ResourceBase, fields: &Fields<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            base,
            origin: fields.required("_origin")?,
            relation: fields.required("_relation")?,
            destination: fields.required("_destination")?,
            value: fields.or("_value", Record::new())?,
        })
    }

    /// Write the edge into the `relations` table, keyed by its triple.
    fn persist(&self, database: &Database) -> CorralResult<()> {
        let edge = Edge {
            id: self.base.id.clone(),
            origin_type: endpoint_kind(&self.origin, "_origin")?,
            origin: &self.origin,
            relation: self.relation,
            destination_type: endpoint_kind(&self.destination, "_destination")?,
            destination: &self.destination,
        };
        upsert_edge(database, &edge, &self.value)?;
        Ok(())
    }
}

impl Persistent<Relation> {
    /// Replace the edge value.
    pub fn set_value(&self, value: Record) -> CorralResult<()> {
        self.update(|relation| relation.value = value)
    }
}
