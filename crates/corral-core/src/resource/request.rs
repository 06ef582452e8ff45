//! Free-form requests.

use super::{Persistent, Resource, ResourceBase, Validate};
use crate::context::Corral;
use crate::formats::{Encode, Fields, Record};
use crate::types::{CorralResult, ResourceType, ValidationError};
use std::sync::Arc;

/// A request carrying an arbitrary fragment of structured data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub base: ResourceBase,
    pub fragment: Record,
}

impl Request {
    pub fn new(name: impl Into<String>, fragment: Record, description: Option<&str>) -> Self {
        Self {
            base: ResourceBase::new(ResourceType::Request, name, description),
            fragment,
        }
    }

    pub fn make(
        corral: &Corral,
        name: &str,
        fragment: Record,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register(Self::new(name, fragment, description))
    }
}

impl Validate for Request {
    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()
    }
}

impl Resource for Request {
    const KIND: ResourceType = ResourceType::Request;

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn encode_fields(&self, record: &mut Record) {
        record.insert("_fragment".to_string(), self.fragment.encode());
    }

    fn decode_fields(base: ResourceBase, fields: &Fields<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            base,
            fragment: fields.required("_fragment")?,
        })
    }
}

impl Persistent<Request> {
    pub fn set_fragment(&self, fragment: Record) -> CorralResult<()> {
        self.update(|request| request.fragment = fragment)
    }
}
