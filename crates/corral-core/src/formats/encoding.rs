//! # Canonical Value Encoding
//!
//! Every persisted field is reduced to an `Encoded` value before it is
//! written. `Encoded` is a closed sum type: each Rust type that can appear in
//! a resource implements `Encode` (value → variant) and `Decode`
//! (variant → value, type-checked), and dispatch is a plain `match`.
//!
//! Reduction rules:
//! - enumerations store their raw scalar (`Text`, or `Int` for IP families)
//! - nested objects become a nested `Map`
//! - sequences and sets keep their container kind (`List` / `Set`)
//! - timestamps are RFC 3339 text with nanosecond precision
//! - `None` becomes `Null`

use crate::types::{
    DnsRecordType, IpAddressType, RelationType, ResourceId, ResourceType, Status, Timestamp,
    TransportProtocol, ValidationError, format_timestamp, parse_timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ENCODED VALUE
// =============================================================================

/// A canonical encoded value.
///
/// Maps use `BTreeMap`, so the same logical value always yields the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Encoded {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Encoded>),
    Set(BTreeSet<Encoded>),
    Map(BTreeMap<String, Encoded>),
}

/// A map of field name to encoded value: the shape of every payload.
pub type Record = BTreeMap<String, Encoded>;

impl Encoded {
    /// Short name of the variant, used in type mismatch reports.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Shorthand for a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Reduce a value to its canonical encoded form.
pub trait Encode {
    fn encode(&self) -> Encoded;
}

/// Rebuild a value from its canonical encoded form.
///
/// `field` is the path reported in errors (e.g. `status[0].value`).
pub trait Decode: Sized {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError>;
}

impl Encode for Encoded {
    fn encode(&self) -> Encoded {
        self.clone()
    }
}

impl Decode for Encoded {
    fn decode(value: &Encoded, _field: &str) -> Result<Self, ValidationError> {
        Ok(value.clone())
    }
}

impl Encode for bool {
    fn encode(&self) -> Encoded {
        Encoded::Bool(*self)
    }
}

impl Decode for bool {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        match value {
            Encoded::Bool(b) => Ok(*b),
            other => Err(ValidationError::mismatch(field, "bool", other.type_name())),
        }
    }
}

impl Encode for i64 {
    fn encode(&self) -> Encoded {
        Encoded::Int(*self)
    }
}

impl Decode for i64 {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        match value {
            Encoded::Int(i) => Ok(*i),
            other => Err(ValidationError::mismatch(field, "int", other.type_name())),
        }
    }
}

/// Narrow integers encode as `Int` and are range-checked on decode.
macro_rules! narrow_int {
    ($($ty:ty),+) => {
        $(
            impl Encode for $ty {
                fn encode(&self) -> Encoded {
                    Encoded::Int(i64::from(*self))
                }
            }

            impl Decode for $ty {
                fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
                    let wide = i64::decode(value, field)?;
                    <$ty>::try_from(wide).map_err(|_| ValidationError::Malformed {
                        field: field.to_string(),
                        reason: format!("{wide} is out of range for {}", stringify!($ty)),
                    })
                }
            }
        )+
    };
}

narrow_int!(u16, u32);

impl Encode for String {
    fn encode(&self) -> Encoded {
        Encoded::Text(self.clone())
    }
}

impl Decode for String {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        match value {
            Encoded::Text(s) => Ok(s.clone()),
            other => Err(ValidationError::mismatch(field, "text", other.type_name())),
        }
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self) -> Encoded {
        self.as_ref().map_or(Encoded::Null, Encode::encode)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        match value {
            Encoded::Null => Ok(None),
            other => T::decode(other, field).map(Some),
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self) -> Encoded {
        Encoded::List(self.iter().map(Encode::encode).collect())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        match value {
            Encoded::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| T::decode(item, &format!("{field}[{i}]")))
                .collect(),
            other => Err(ValidationError::mismatch(field, "list", other.type_name())),
        }
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self) -> Encoded {
        Encoded::Set(self.iter().map(Encode::encode).collect())
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        match value {
            Encoded::Set(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| T::decode(item, &format!("{field}{{{i}}}")))
                .collect(),
            other => Err(ValidationError::mismatch(field, "set", other.type_name())),
        }
    }
}

impl<T: Encode> Encode for BTreeMap<String, T> {
    fn encode(&self) -> Encoded {
        Encoded::Map(self.iter().map(|(k, v)| (k.clone(), v.encode())).collect())
    }
}

impl<T: Decode> Decode for BTreeMap<String, T> {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        match value {
            Encoded::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::decode(v, &format!("{field}[{k}]"))?)))
                .collect(),
            other => Err(ValidationError::mismatch(field, "map", other.type_name())),
        }
    }
}

impl Encode for ResourceId {
    fn encode(&self) -> Encoded {
        Encoded::text(self.as_str())
    }
}

impl Decode for ResourceId {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        let raw = String::decode(value, field)?;
        ResourceId::parse(raw).map_err(|_| ValidationError::Malformed {
            field: field.to_string(),
            reason: "empty identifier".to_string(),
        })
    }
}

impl Encode for Timestamp {
    fn encode(&self) -> Encoded {
        Encoded::Text(format_timestamp(self))
    }
}

impl Decode for Timestamp {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        let raw = String::decode(value, field)?;
        parse_timestamp(&raw).map_err(|e| ValidationError::Malformed {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Encode for IpAddressType {
    fn encode(&self) -> Encoded {
        Encoded::Int(self.code())
    }
}

impl Decode for IpAddressType {
    fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
        let code = i64::decode(value, field)?;
        IpAddressType::from_code(code).ok_or_else(|| ValidationError::Malformed {
            field: field.to_string(),
            reason: format!("unknown IP address family {code}"),
        })
    }
}

/// Text-backed enumerations encode as their raw scalar.
macro_rules! text_enum_codec {
    ($($ty:ty),+) => {
        $(
            impl Encode for $ty {
                fn encode(&self) -> Encoded {
                    Encoded::text(self.as_str())
                }
            }

            impl Decode for $ty {
                fn decode(value: &Encoded, field: &str) -> Result<Self, ValidationError> {
                    let raw = String::decode(value, field)?;
                    <$ty>::parse(&raw).ok_or_else(|| ValidationError::Malformed {
                        field: field.to_string(),
                        reason: format!("unknown value '{raw}'"),
                    })
                }
            }
        )+
    };
}

text_enum_codec!(
    ResourceType,
    RelationType,
    Status,
    DnsRecordType,
    TransportProtocol
);

// =============================================================================
// FIELD ACCESS
// =============================================================================

/// Typed, checked access to the fields of a decoded record.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    record: &'a Record,
}

impl<'a> Fields<'a> {
    /// Wrap a record.
    #[must_use]
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    /// Decode a field that must be present.
    pub fn required<T: Decode>(&self, name: &str) -> Result<T, ValidationError> {
        match self.record.get(name) {
            Some(value) => T::decode(value, name),
            None => Err(ValidationError::missing(name)),
        }
    }

    /// Decode a field that may be absent or null.
    pub fn optional<T: Decode>(&self, name: &str) -> Result<Option<T>, ValidationError> {
        match self.record.get(name) {
            None | Some(Encoded::Null) => Ok(None),
            Some(value) => T::decode(value, name).map(Some),
        }
    }

    /// Decode a field, falling back to `default` when absent or null.
    pub fn or<T: Decode>(&self, name: &str, default: T) -> Result<T, ValidationError> {
        Ok(self.optional(name)?.unwrap_or(default))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_reduce_to_raw_scalar() {
        assert_eq!(IpAddressType::V6.encode(), Encoded::Int(6));
        assert_eq!(TransportProtocol::Udp.encode(), Encoded::text("UDP"));
        assert_eq!(RelationType::BelongsTo.encode(), Encoded::text("belongsto"));
    }

    #[test]
    fn containers_keep_their_kind() {
        let list = vec![1i64, 2, 3].encode();
        assert!(matches!(list, Encoded::List(_)));

        let set: BTreeSet<String> = ["b".to_string(), "a".to_string()].into_iter().collect();
        assert!(matches!(set.encode(), Encoded::Set(_)));

        let decoded: BTreeSet<String> = Decode::decode(&set.encode(), "tags").expect("decode");
        assert_eq!(decoded, set);
    }

    #[test]
    fn element_mismatch_names_the_element() {
        let value = Encoded::List(vec![Encoded::text("ip:1"), Encoded::Int(7)]);
        let err = Vec::<ResourceId>::decode(&value, "ips").expect_err("must fail");

        assert_eq!(err, ValidationError::mismatch("ips[1]", "text", "int"));
    }

    #[test]
    fn map_value_mismatch_names_the_key() {
        let mut entries = BTreeMap::new();
        entries.insert("weight".to_string(), Encoded::text("heavy"));
        let err = BTreeMap::<String, i64>::decode(&Encoded::Map(entries), "labels")
            .expect_err("must fail");

        assert_eq!(err.field(), "labels[weight]");
    }

    #[test]
    fn narrow_ints_are_range_checked() {
        assert_eq!(u16::decode(&Encoded::Int(8080), "port"), Ok(8080));
        let err = u16::decode(&Encoded::Int(70_000), "port").expect_err("out of range");
        assert!(matches!(err, ValidationError::Malformed { .. }));
    }

    #[test]
    fn option_maps_to_null() {
        let none: Option<String> = None;
        assert_eq!(none.encode(), Encoded::Null);
        assert_eq!(Option::<String>::decode(&Encoded::Null, "d"), Ok(None));
    }

    #[test]
    fn fields_distinguish_missing_from_mismatched() {
        let mut record = Record::new();
        record.insert("name".to_string(), Encoded::Int(3));
        let fields = Fields::new(&record);

        assert_eq!(
            fields.required::<String>("_value"),
            Err(ValidationError::missing("_value"))
        );
        assert_eq!(
            fields.required::<String>("name"),
            Err(ValidationError::mismatch("name", "text", "int"))
        );
        assert_eq!(fields.or::<u32>("_ttl", 30), Ok(30));
    }
}
