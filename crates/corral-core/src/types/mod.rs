//! # Core Type Definitions
//!
//! This module contains the small vocabulary shared by every other module:
//! - Resource identifiers (`ResourceId`, in `id`)
//! - Closed enumerations (`ResourceType`, `RelationType`, `Status`, ...)
//! - Timestamps and their canonical text form
//! - Error types (`ValidationError`, `CorralError`)
//!
//! Enumerations reduce to a raw scalar (`as_str` / `code`) for storage and
//! parse back from it. That scalar is what lands in SQL columns and payloads.

mod id;

pub use id::ResourceId;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// TEXT-BACKED ENUMERATIONS
// =============================================================================

/// Declare a closed enumeration backed by a text scalar.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $raw:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The raw scalar stored for this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $raw ),+
                }
            }

            /// Parse the raw scalar back into a variant.
            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $( $raw => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| ValidationError::Malformed {
                    field: stringify!($name).to_string(),
                    reason: format!("unknown value '{s}'"),
                })
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                raw.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum! {
    /// Tag identifying a persistent resource kind.
    ///
    /// The tag prefixes every `ResourceId` and fills the `*_type` columns of
    /// the relations table.
    pub enum ResourceType {
        Cluster => "cluster",
        Node => "node",
        Pod => "pod",
        Application => "application",
        Service => "service",
        IpAddress => "ip",
        Port => "port",
        DnsRecord => "dns",
        Request => "request",
        Relation => "relation",
    }
}

impl ResourceType {
    /// The table mirroring resources of this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Cluster => "clusters",
            Self::Node => "nodes",
            Self::Pod => "pods",
            Self::Application => "applications",
            Self::Service => "services",
            Self::IpAddress => "ip_addresses",
            Self::Port => "ports",
            Self::DnsRecord => "dns_records",
            Self::Request => "requests",
            Self::Relation => crate::primitives::RELATIONS_TABLE,
        }
    }
}

text_enum! {
    /// Type of a directed edge between two resources.
    pub enum RelationType {
        IsA => "isa",
        BelongsTo => "belongsto",
    }
}

text_enum! {
    /// Outcome recorded by a status entry.
    pub enum Status {
        Unknown => "unknown",
        Failure => "failure",
        Success => "success",
    }
}

text_enum! {
    /// DNS record type.
    pub enum DnsRecordType {
        A => "A",
        Aaaa => "AAAA",
        Cname => "CNAME",
    }
}

text_enum! {
    /// Transport protocol of a port mapping.
    pub enum TransportProtocol {
        Tcp => "TCP",
        Udp => "UDP",
    }
}

// =============================================================================
// INTEGER-BACKED ENUMERATIONS
// =============================================================================

/// IP address family. Stored as its version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IpAddressType {
    V4,
    V6,
}

impl IpAddressType {
    /// The raw scalar stored for this variant.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::V4 => 4,
            Self::V6 => 6,
        }
    }

    /// Parse the raw scalar back into a variant.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            4 => Some(Self::V4),
            6 => Some(Self::V6),
            _ => None,
        }
    }
}

impl fmt::Display for IpAddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.code())
    }
}

// =============================================================================
// TIMESTAMPS
// =============================================================================

/// Wall-clock instant attached to rows and status entries.
pub type Timestamp = DateTime<Utc>;

/// The current instant.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Canonical text form of a timestamp (RFC 3339, nanosecond precision).
///
/// Parsing the output with `parse_timestamp` yields the identical instant.
#[must_use]
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a timestamp written by `format_timestamp`.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, ValidationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ValidationError::Malformed {
            field: "date".to_string(),
            reason: e.to_string(),
        })
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Input that does not satisfy a resource's declared shape.
///
/// Always recoverable: fix the input and retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was not supplied.
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    /// A field holds a value of the wrong type.
    #[error("expected type '{expected}' for field '{field}', received '{received}' instead")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        received: &'static str,
    },

    /// A field has the right type but an unusable value.
    #[error("malformed field '{field}': {reason}")]
    Malformed { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for `MissingField`.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Shorthand for `TypeMismatch`.
    pub fn mismatch(field: impl Into<String>, expected: &'static str, received: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            received,
        }
    }

    /// The field this error refers to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field }
            | Self::TypeMismatch { field, .. }
            | Self::Malformed { field, .. } => field,
        }
    }
}

/// Errors that can occur in the Corral core.
///
/// - No silent failures
/// - The core never prints and never exits; callers decide
#[derive(Debug, Error)]
pub enum CorralError {
    /// Construction or mutation input was rejected.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An identifier lookup missed the knowledge base.
    #[error("resource with ID '{0}' not found")]
    ResourceNotFound(String),

    /// A store name that was never registered.
    #[error("database with name '{0}' not found")]
    DatabaseNotFound(String),

    /// Failure surfaced by the relational store.
    #[error("storage error: {0}")]
    Storage(String),

    /// Payload encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure outside the store itself.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CorralError {
    /// Check whether this is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<rusqlite::Error> for CorralError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result alias used throughout the core.
pub type CorralResult<T> = Result<T, CorralError>;

// =============================================================================
// TESTS
// =============================================================================
