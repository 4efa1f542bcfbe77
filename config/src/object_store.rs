use serde::Deserialize;

use crate::load_config;

#[derive(Debug, Deserialize, Eq, PartialEq, Clone, Copy)]
pub enum ObjectStoreMode {
    FileBacked,
}

/// Configuration for the blob store holding uploaded chunks.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    #[serde(default = "ObjectStoreConfig::default_region")]
    pub region: String,
    pub mode: ObjectStoreMode,
    pub file_backed_base_path: String,
    #[serde(default = "ObjectStoreConfig::default_max_retries")]
    pub max_retries: u16,
}

impl ObjectStoreConfig {
    fn default_region() -> String {
        "us-east-1".to_owned()
    }

    const fn default_max_retries() -> u16 {
        5
    }
}

pub fn load_object_store_config() -> Result<ObjectStoreConfig, config::ConfigError> {
    load_config("config/configuration/object_store", "KALDB_OBJECT_STORE")
}
