//! Resource identifiers.
//!
//! A `ResourceId` is the string `"<kind>:<suffix>"`, where `<suffix>` is the
//! first eight hex characters of a random UUID v4. The string itself is the
//! identity: it is the knowledge base key and the SQL primary key.

use super::{ResourceType, ValidationError};
use crate::primitives::ID_SUFFIX_LEN;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use uuid::Uuid;

/// Typed identifier of a resource instance.
///
/// Minted once per instance and never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    /// Mint a fresh identifier scoped to `kind`.
    #[must_use]
    pub fn make(kind: ResourceType) -> Self {
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(ID_SUFFIX_LEN)
            .collect();
        Self(format!("{}:{}", kind.as_str(), suffix))
    }

    /// Wrap an already-serialized identifier.
    ///
    /// The kind prefix is not re-validated; only the empty string is rejected.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::Malformed {
                field: "id".to_string(),
                reason: "empty identifier".to_string(),
            });
        }
        Ok(Self(raw))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind encoded in the prefix, if it names a known kind.
    #[must_use]
    pub fn kind(&self) -> Option<ResourceType> {
        self.0
            .split_once(':')
            .and_then(|(prefix, _)| ResourceType::parse(prefix))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl ToSql for ResourceId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for ResourceId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(|s| Self(s.to_string()))
    }
}
