//! # Application Configuration
//!
//! The binary reads one TOML file:
//!
//! ```toml
//! [store]
//! data_dir = "/var/lib/corral"
//! overrides = { events = ":memory:" }
//!
//! [log]
//! format = "json"
//! filter = "corral=debug"
//!
//! [orchestrator]
//! tick_ms = 5000
//! ```
//!
//! Every section is optional. Environment variables (`CORRAL_USER_DATA_DIR`,
//! `CORRAL_<STORE>_DB`, `CORRAL_LOG_FORMAT`) win over the file.

use corral_core::{CorralError, CorralResult, StoreConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no `--config` is given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "corral.toml";

/// Environment variable selecting the log formatter.
pub const LOG_FORMAT_ENV: &str = "CORRAL_LOG_FORMAT";

/// Filter used when neither `RUST_LOG` nor the config file sets one.
pub const DEFAULT_LOG_FILTER: &str = "corral=info,corral_core=info";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives. `RUST_LOG` still takes precedence.
    pub filter: Option<String>,
}

impl LogConfig {
    /// The filter directives to fall back on when `RUST_LOG` is unset.
    #[must_use]
    pub fn filter_or_default(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Milliseconds between two checkpoints.
    pub tick_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

impl OrchestratorConfig {
    /// Tick period. Never zero.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Everything the binary can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub log: LogConfig,
    pub orchestrator: OrchestratorConfig,
}

impl AppConfig {
    /// Parse a TOML document. Environment overrides are not applied.
    pub fn from_toml(raw: &str) -> CorralResult<Self> {
        toml::from_str(raw).map_err(|e| CorralError::Serialization(format!("invalid config: {e}")))
    }

    /// Load the configuration the binary runs with.
    ///
    /// Reads `path` when given (it must exist), else `corral.toml` in the
    /// working directory when present, else the defaults. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> CorralResult<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };
        let config = match file {
            Some(file) => {
                let raw = std::fs::read_to_string(&file).map_err(|e| {
                    CorralError::Io(format!("cannot read config '{}': {e}", file.display()))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Apply environment overrides read through `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(format) = lookup(LOG_FORMAT_ENV).as_deref().and_then(LogFormat::parse) {
            self.log.format = format;
        }
        self.store = self.store.with_env(lookup);
        self
    }
}
