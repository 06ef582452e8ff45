//! Status entries attached to every resource.

use crate::formats::{Decode, Encode, Encoded, Record};
use crate::primitives::CREATED_STATUS_KEY;
use crate::types::{ResourceId, Status, Timestamp, ValidationError, now};

/// One entry of a resource's status history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    pub key: String,
    pub value: Status,
    pub description: Option<String>,
    /// Resource responsible for the transition, if any.
    pub reason: Option<ResourceId>,
    pub date: Timestamp,
}

impl ResourceStatus {
    /// New entry dated now.
    pub fn new(key: impl Into<String>, value: Status) -> Self {
        Self {
            key: key.into(),
            value,
            description: None,
            reason: None,
            date: now(),
        }
    }

    /// The entry every resource starts with: `created` / `success`.
    #[must_use]
    pub fn created() -> Self {
        Self::new(CREATED_STATUS_KEY, Status::Success)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: ResourceId) -> Self {
        self.reason = Some(reason);
        self
    }

    pub(crate) fn validate_at(&self, field: &str) -> Result<(), ValidationError> {
        if self.key.is_empty() {
            return Err(ValidationError::missing(format!("{field}.key")));
        }
        Ok(())
    }
}

impl Encode for ResourceStatus {
    fn encode(&self) -> Encoded {
        let mut map = Record::new();
        map.insert("key".to_string(), self.key.encode());
        map.insert("value".to_string(), self.value.encode());
        map.insert("description".to_string(), self.description.encode());
        map.insert("reason".to_string(), self.reason.encode());
        map.insert("date".to_string(), self.date.encode());
        Encoded::Map(map)
    }
}

impl Decode for ResourceStatus {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        let Encoded::Map(map) = value else {
            return Err(ValidationError::mismatch(field, "map", value.type_name()));
        };
        Ok(Self {
            key: member(map, field, "key")?
                .ok_or_else(|| ValidationError::missing(format!("{field}.key")))?,
            value: member(map, field, "value")?
                .ok_or_else(|| ValidationError::missing(format!("{field}.value")))?,
            description: member(map, field, "description")?,
            reason: member(map, field, "reason")?,
            date: member(map, field, "date")?
                .ok_or_else(|| ValidationError::missing(format!("{field}.date")))?,
        })
    }
}

fn member<T: Decode>(map: &Record, field: &str, key: &str) -> Result<Option<T>, ValidationError> {
    match map.get(key) {
        None | Some(Encoded::Null) => Ok(None),
        Some(value) => T::decode(value, &format!("{field}.{key}")).map(Some),
    }
}
