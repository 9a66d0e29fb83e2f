//! Bus configuration (spec §6).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_max_subscriptions() -> usize {
    10_000
}

fn default_dispatch_timeout_secs() -> u64 {
    30
}

fn default_handler_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_handlers() -> usize {
    64
}

/// Tunables for a [`crate::bus::NeuroBus`] instance.
///
/// Deserializable from TOML via [`BusConfig::from_toml_file`]; any field
/// left out of the source document falls back to the default named next to
/// it below, matching spec §6's defaults table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,

    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enable_error_isolation: bool,

    #[serde(default = "default_true")]
    pub enable_parallel_dispatch: bool,

    #[serde(default = "default_max_concurrent_handlers")]
    pub max_concurrent_handlers: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_subscriptions: default_max_subscriptions(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            handler_timeout_secs: default_handler_timeout_secs(),
            enable_error_isolation: default_true(),
            enable_parallel_dispatch: default_true(),
            max_concurrent_handlers: default_max_concurrent_handlers(),
        }
    }
}

impl BusConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    /// Load a [`BusConfig`] from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| crate::Error::Other(anyhow::anyhow!(err)))
    }

    /// Load a [`BusConfig`] from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|err| crate::Error::Other(err.into()))?;
        Self::from_toml_str(&source)
    }
}
