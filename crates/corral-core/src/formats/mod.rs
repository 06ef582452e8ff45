//! # Formats
//!
//! Canonical encoding of resource fields (`encoding`) and the binary payload
//! stored in the relational store (`payload`).

mod encoding;
mod payload;

pub use encoding::{Decode, Encode, Encoded, Fields, Record};
pub use payload::{PayloadHeader, record_from_bytes, record_to_bytes};
