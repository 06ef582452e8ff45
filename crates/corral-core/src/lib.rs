//! # corral-core
//!
//! The resource persistence engine for Corral - THE LOGIC.
//!
//! This crate models a fleet of resources (clusters, nodes, pods,
//! applications, services, ports, DNS records, IP addresses, requests) and
//! the relations between them, and keeps that model durable:
//!
//! - Every resource validates itself before it is registered or changed
//! - Every registered resource is indexed in the `KnowledgeBase` and
//!   mirrored into one SQLite row
//! - Writes are batched by reference-counted `Session` scopes
//! - Edges are deduplicated on `(origin, relation, destination)`
//!
//! ## Architectural Constraints
//!
//! - Synchronous: blocking I/O only, NO async runtime
//! - Explicit state: every component hangs off a `Corral` context
//! - The core never prints and never exits; every failure is a `CorralError`

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod context;
pub mod critical;
pub mod events;
pub mod formats;
pub mod knowledge;
pub mod primitives;
pub mod relations;
pub mod resource;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CorralError, CorralResult, DnsRecordType, IpAddressType, RelationType, ResourceId,
    ResourceType, Status, Timestamp, TransportProtocol, ValidationError,
};

// =============================================================================
// RE-EXPORTS: Resource Model
// =============================================================================

pub use resource::{
    Application, Cluster, DnsRecord, IpAddress, LiveResource, Node, Persistent, Pod, Port,
    Relation, Request, Resource, ResourceBase, ResourceStatus, Service, Validate,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use config::{Location, StoreConfig};
pub use context::{Corral, LoadReport};
pub use critical::{CriticalSection, InterruptLatch};
pub use events::{Event, EventLog};
pub use knowledge::KnowledgeBase;
pub use relations::{RelationFilter, RelationRow, RelationsManager};
pub use storage::{Database, Persistency, Session, StoredRow};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    Decode, Encode, Encoded, Fields, PayloadHeader, Record, record_from_bytes, record_to_bytes,
};
