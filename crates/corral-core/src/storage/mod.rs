//! # Storage
//!
//! SQLite-backed stores, the session scopes that batch their commits, and the
//! registry that names them.

mod database;
mod registry;
mod session;

pub use database::{Database, StoredRow};
pub use registry::Persistency;
pub use session::Session;
