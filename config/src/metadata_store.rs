use std::time::Duration;

use serde::Deserialize;

use crate::load_config;

#[derive(Debug, Deserialize, Eq, PartialEq, Clone, Copy)]
pub enum MetadataStoreMode {
    InMemory,
}

/// Configuration for the coordination store holding cluster metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetadataStoreConfig {
    pub connection_string: String,
    /// Root path under which all entity directories live.
    pub path_prefix: String,
    pub mode: MetadataStoreMode,
    #[serde(default = "MetadataStoreConfig::default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl MetadataStoreConfig {
    const fn default_session_timeout_ms() -> u64 {
        30_000
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

pub fn load_metadata_store_config() -> Result<MetadataStoreConfig, config::ConfigError> {
    load_config("config/configuration/metadata_store", "KALDB_METADATA_STORE")
}
