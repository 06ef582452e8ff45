//! # Payload Format
//!
//! Binary form of a resource record as stored in a table's `value` column.
//!
//! Format: Header (5 bytes) + postcard-serialized `Record`.
//! - 4 bytes: Magic ("CRRL")
//! - 1 byte: Version
//!
//! The record is a `BTreeMap`, so encoding is canonical: equal records give
//! equal bytes.
//!
//! ## Limits
//!
//! Size and header are validated before the payload is decoded, so a
//! truncated or corrupted row fails cleanly instead of allocating.

use super::encoding::Record;
use crate::primitives;
use crate::types::CorralError;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PayloadHeader {
    /// Header of the format version this build writes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Reject foreign payloads and versions this build cannot read.
    pub fn validate(&self) -> Result<(), CorralError> {
        match (&self.magic, self.version) {
            (magic, _) if magic != primitives::MAGIC_BYTES => Err(CorralError::Serialization(
                format!("not a corral payload (leading bytes {magic:02x?})"),
            )),
            (_, primitives::FORMAT_VERSION) => Ok(()),
            (_, version) => Err(CorralError::Serialization(format!(
                "payload format v{version} is not readable by v{}",
                primitives::FORMAT_VERSION
            ))),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; primitives::HEADER_LEN] {
        let [m0, m1, m2, m3] = self.magic;
        [m0, m1, m2, m3, self.version]
    }

    /// Parse the leading header of `bytes`. Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorralError> {
        let Some(&[m0, m1, m2, m3, version]) = bytes.first_chunk::<{ primitives::HEADER_LEN }>()
        else {
            return Err(CorralError::Serialization(format!(
                "header needs {} bytes, got {}",
                primitives::HEADER_LEN,
                bytes.len()
            )));
        };
        Ok(Self {
            magic: [m0, m1, m2, m3],
            version,
        })
    }
}

impl Default for PayloadHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a record to bytes (header + payload).
pub fn record_to_bytes(record: &Record) -> Result<Vec<u8>, CorralError> {
    postcard::to_extend(record, PayloadHeader::new().to_bytes().to_vec())
        .map_err(|e| CorralError::Serialization(e.to_string()))
}

/// Deserialize a record from bytes.
pub fn record_from_bytes(bytes: &[u8]) -> Result<Record, CorralError> {
    if bytes.len() > primitives::MAX_PAYLOAD_SIZE {
        return Err(CorralError::Serialization(format!(
            "payload of {} bytes exceeds the {} byte limit",
            bytes.len(),
            primitives::MAX_PAYLOAD_SIZE
        )));
    }
    PayloadHeader::from_bytes(bytes)?.validate()?;

    let (_, body) = bytes.split_at(primitives::HEADER_LEN);
    postcard::from_bytes(body)
        .map_err(|e| CorralError::Serialization(format!("corrupt payload body: {e}")))
}

// =============================================================================
// TESTS
// =============================================================================
