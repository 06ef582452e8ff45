//! # Store Configuration
//!
//! Where the relational stores live on disk.
//!
//! Resolution order for a store's location:
//! 1. `overrides[name]` (from a config file or `CORRAL_<NAME>_DB`)
//! 2. `<data_dir>/databases/v<SCHEMA_VERSION>/<name>.db`
//!
//! `data_dir` defaults to `$CORRAL_USER_DATA_DIR`, then `$HOME/.corral`.
//! The path `:memory:` selects an in-memory database.

use crate::primitives::{ENV_PREFIX, EVENTS_DB, IN_MEMORY_PATH, RESOURCES_DB, SCHEMA_VERSION};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a single store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A database file.
    File(PathBuf),
    /// A private in-memory database, gone when the store is dropped.
    Memory,
}

impl Location {
    fn from_raw(raw: &str) -> Self {
        if raw == IN_MEMORY_PATH {
            Self::Memory
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str(IN_MEMORY_PATH),
        }
    }
}

/// Configuration of the relational stores.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for user data.
    pub data_dir: PathBuf,
    /// Names of the stores to register.
    pub databases: Vec<String>,
    /// Per-store path overrides (`:memory:` allowed).
    pub overrides: BTreeMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".corral"),
            databases: vec![RESOURCES_DB.to_string(), EVENTS_DB.to_string()],
            overrides: BTreeMap::new(),
        }
    }
}

impl StoreConfig {
    /// Resolve configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Every store in memory. Used by tests and throwaway runs.
    #[must_use]
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        for name in config.databases.clone() {
            config.overrides.insert(name, IN_MEMORY_PATH.to_string());
        }
        config
    }

    /// Every store under `data_dir`.
    #[must_use]
    pub fn under(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Environment values win over values already present.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(&format!("{ENV_PREFIX}_USER_DATA_DIR")) {
            self.data_dir = PathBuf::from(dir);
        } else if self.data_dir == Self::default().data_dir {
            if let Some(home) = lookup("HOME") {
                self.data_dir = PathBuf::from(home).join(".corral");
            }
        }
        for name in &self.databases {
            if let Some(path) = lookup(&Self::env_key(name)) {
                self.overrides.insert(name.clone(), path);
            }
        }
        self
    }

    /// Environment variable overriding the path of store `name`.
    #[must_use]
    pub fn env_key(name: &str) -> String {
        format!("{ENV_PREFIX}_{}_DB", name.to_uppercase())
    }

    /// Directory holding the store files of the current schema version.
    #[must_use]
    pub fn databases_dir(&self) -> PathBuf {
        self.data_dir
            .join("databases")
            .join(format!("v{SCHEMA_VERSION}"))
    }

    /// Resolve the location of store `name`.
    #[must_use]
    pub fn location(&self, name: &str) -> Location {
        match self.overrides.get(name) {
            Some(raw) => Location::from_raw(raw),
            None => Location::File(self.databases_dir().join(format!("{name}.db"))),
        }
    }
}
