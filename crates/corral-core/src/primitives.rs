//! # Primitives
//!
//! Hardcoded constants for the Corral core.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Anything a deployment may want to change lives in `config` instead.

// =============================================================================
// SCHEMA
// =============================================================================

/// Version of the relational schema.
///
/// Baked into the storage path, so stores written by a different schema
/// version are never opened by accident. No automatic migration happens.
pub const SCHEMA_VERSION: &str = "1.0";

/// Schema script applied on first open of every store.
///
/// Every statement is `CREATE ... IF NOT EXISTS`, so applying it again is a no-op.
pub const SCHEMA_SCRIPT: &str = include_str!("../schema/1.0/schema.sql");

// =============================================================================
// PAYLOAD FORMAT
// =============================================================================

/// Magic bytes preceding every encoded payload.
pub const MAGIC_BYTES: &[u8; 4] = b"CRRL";

/// Current payload format version.
///
/// Bit-for-bit compatibility is only guaranteed within one version.
pub const FORMAT_VERSION: u8 = 1;

/// Header length: magic bytes + version byte.
pub const HEADER_LEN: usize = 5;

/// Maximum accepted payload size (16 MB).
///
/// Checked before decoding so a corrupted row cannot trigger a huge allocation.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// STORES
// =============================================================================

/// Name of the store holding resource tables and the relations table.
pub const RESOURCES_DB: &str = "resources";

/// Name of the store holding the status event log.
pub const EVENTS_DB: &str = "events";

/// Name of the relations table.
pub const RELATIONS_TABLE: &str = "relations";

/// Name of the status event table.
pub const EVENTS_TABLE: &str = "events";

/// Path value that selects an in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Prefix of every environment variable read by the core.
pub const ENV_PREFIX: &str = "CORRAL";

// =============================================================================
// RESOURCE DEFAULTS
// =============================================================================

/// Number of hex characters taken from a UUID for an identifier suffix.
pub const ID_SUFFIX_LEN: usize = 8;

/// Default TTL (seconds) for DNS records.
pub const DEFAULT_DNS_TTL: u32 = 30;

/// Status key recorded when a resource is created.
pub const CREATED_STATUS_KEY: &str = "created";
