use serde::Deserialize;

use crate::load_config;

/// Configuration for the indexer role.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexerConfig {
    /// Upstream partition this indexer owns.
    pub partition_id: String,
    /// Falling further behind the upstream head than this creates a
    /// recovery task instead of catching up inline.
    #[serde(default = "IndexerConfig::default_max_offset_delay_messages")]
    pub max_offset_delay_messages: u64,
    /// Chunk roll-over threshold for live indexing.
    #[serde(default = "IndexerConfig::default_max_messages_per_chunk")]
    pub max_messages_per_chunk: u64,
}

impl IndexerConfig {
    const fn default_max_offset_delay_messages() -> u64 {
        10_000
    }

    const fn default_max_messages_per_chunk() -> u64 {
        100_000
    }
}

pub fn load_indexer_config() -> Result<IndexerConfig, config::ConfigError> {
    load_config("config/configuration/indexer", "KALDB_INDEXER")
}
