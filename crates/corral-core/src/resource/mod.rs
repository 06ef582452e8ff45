//! # Resource Model
//!
//! Every persistent resource kind is a plain struct embedding a
//! `ResourceBase` and implementing `Resource`:
//!
//! - `validate()` checks declared constraints and runs before a resource is
//!   registered or a mutation is committed
//! - `to_record()` / `from_record()` map the struct to and from its canonical
//!   field record (see `formats::encoding`)
//! - `serialize()` / `deserialize()` add the binary payload header
//!
//! The identifier is never written into the payload; it is the row key and is
//! supplied back on `deserialize`.
//!
//! Registered resources live behind a `Persistent<R>` handle (see
//! `persistent`), which owns the per-instance lock and commits every accepted
//! mutation.

/// Declare a resource kind without own fields.
macro_rules! plain_resource {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub base: $crate::resource::ResourceBase,
        }

        impl $name {
            /// New instance with a freshly minted identifier.
            pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
                Self {
                    base: $crate::resource::ResourceBase::new(
                        $crate::types::ResourceType::$kind,
                        name,
                        description,
                    ),
                }
            }
        }

        impl $crate::resource::Validate for $name {
            fn validate(&self) -> Result<(), $crate::types::ValidationError> {
                $crate::resource::Validate::validate(&self.base)
            }
        }

        impl $crate::resource::Resource for $name {
            const KIND: $crate::types::ResourceType = $crate::types::ResourceType::$kind;

            fn base(&self) -> &$crate::resource::ResourceBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $crate::resource::ResourceBase {
                &mut self.base
            }

            fn encode_fields(&self, _record: &mut $crate::formats::Record) {}

            fn decode_fields(
                base: $crate::resource::ResourceBase,
                _fields: &$crate::formats::Fields<'_>,
            ) -> Result<Self, $crate::types::ValidationError> {
                Ok(Self { base })
            }
        }
    };
}

mod compute;
mod network;
mod persistent;
mod relation;
mod request;
mod status;

pub use compute::{Application, Cluster, Node, Pod};
pub use network::{DnsRecord, IpAddress, Port, Service};
pub use persistent::{LiveResource, Persistent};
pub use relation::Relation;
pub use request::Request;
pub use status::ResourceStatus;

use crate::formats::{Encode, Fields, Record, record_from_bytes, record_to_bytes};
use crate::storage::Database;
use crate::types::{CorralResult, ResourceId, ResourceType, ValidationError};
use std::fmt;

// =============================================================================
// VALIDATION
// =============================================================================

/// Declared constraints of a value.
pub trait Validate {
    /// Check every constraint. The first violation is reported.
    fn validate(&self) -> Result<(), ValidationError>;
}

// =============================================================================
// SHARED FIELDS
// =============================================================================

/// Fields shared by every resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBase {
    /// Identity. Not part of the payload.
    pub id: ResourceId,
    pub name: String,
    pub description: Option<String>,
    /// Append-only status history, oldest first.
    pub status: Vec<ResourceStatus>,
}

impl ResourceBase {
    /// Fresh base for `kind`: new identifier, one `created` status entry.
    pub fn new(kind: ResourceType, name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            id: ResourceId::make(kind),
            name: name.into(),
            description: description.map(str::to_string),
            status: vec![ResourceStatus::created()],
        }
    }

    /// Most recent status entry.
    #[must_use]
    pub fn latest_status(&self) -> Option<&ResourceStatus> {
        self.status.last()
    }

    fn encode_into(&self, record: &mut Record) {
        record.insert("name".to_string(), self.name.encode());
        record.insert("description".to_string(), self.description.encode());
        record.insert("status".to_string(), self.status.encode());
    }

    fn decode(id: ResourceId, fields: &Fields<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            name: fields.required("name")?,
            description: fields.optional("description")?,
            status: fields.required("status")?,
        })
    }
}

impl Validate for ResourceBase {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::missing("name"));
        }
        if self.status.is_empty() {
            return Err(ValidationError::missing("status"));
        }
        for (i, status) in self.status.iter().enumerate() {
            status.validate_at(&format!("status[{i}]"))?;
        }
        Ok(())
    }
}

// =============================================================================
// RESOURCE TRAIT
// =============================================================================

/// A persistent resource kind.
pub trait Resource: Validate + Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Kind tag: identifier prefix and table selector.
    const KIND: ResourceType;

    fn base(&self) -> &ResourceBase;

    fn base_mut(&mut self) -> &mut ResourceBase;

    /// Write the kind's own fields into `record`.
    fn encode_fields(&self, record: &mut Record);

    /// Rebuild the kind from its base and its own fields.
    fn decode_fields(base: ResourceBase, fields: &Fields<'_>) -> Result<Self, ValidationError>;

    fn id(&self) -> &ResourceId {
        &self.base().id
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    /// Canonical field record (without the identifier).
    fn to_record(&self) -> Record {
        let mut record = Record::new();
        self.base().encode_into(&mut record);
        self.encode_fields(&mut record);
        record
    }

    /// Rebuild from a field record, type-checking every field.
    fn from_record(record: &Record, id: ResourceId) -> Result<Self, ValidationError> {
        let fields = Fields::new(record);
        let base = ResourceBase::decode(id, &fields)?;
        Self::decode_fields(base, &fields)
    }

    /// Binary payload for the `value` column.
    fn serialize(&self) -> CorralResult<Vec<u8>> {
        record_to_bytes(&self.to_record())
    }

    /// Inverse of `serialize`. The identifier is required, and the decoded
    /// resource must pass `validate`.
    fn deserialize(bytes: &[u8], id: Option<&ResourceId>) -> CorralResult<Self> {
        let id = id.ok_or_else(|| ValidationError::missing("id"))?.clone();
        let record = record_from_bytes(bytes)?;
        let resource = Self::from_record(&record, id)?;
        resource.validate()?;
        Ok(resource)
    }

    /// Write the current state into `database`. Does not commit.
    fn persist(&self, database: &Database) -> CorralResult<()> {
        database.upsert_resource(Self::KIND.table(), self.id(), &self.serialize()?)
    }
}
