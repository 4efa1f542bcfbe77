use std::time::Duration;

use serde::Deserialize;

use crate::load_config;

#[derive(Debug, Deserialize, Eq, PartialEq, Clone, Copy)]
pub enum UpstreamLogMode {
    InMemory,
}

/// Configuration for the upstream event log connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpstreamLogConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub client_group: String,
    pub mode: UpstreamLogMode,
    #[serde(default = "UpstreamLogConfig::default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "UpstreamLogConfig::default_max_poll_records")]
    pub max_poll_records: usize,
}

impl UpstreamLogConfig {
    const fn default_poll_timeout_ms() -> u64 {
        250
    }

    const fn default_max_poll_records() -> usize {
        500
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

pub fn load_upstream_log_config() -> Result<UpstreamLogConfig, config::ConfigError> {
    load_config("config/configuration/upstream_log", "KALDB_UPSTREAM_LOG")
}

#[cfg(test)]
mod tests {
    use crate::utils::tests::EnvMutex;

    use super::{load_upstream_log_config, UpstreamLogConfig, UpstreamLogMode};

    static MUTEX: EnvMutex = EnvMutex::new();

    fn default_upstream_log_config() -> UpstreamLogConfig {
        UpstreamLogConfig {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "test-topic".to_string(),
            client_group: "kaldb-test".to_string(),
            mode: UpstreamLogMode::InMemory,
            poll_timeout_ms: 250,
            max_poll_records: 500,
        }
    }

    #[test]
    fn test_load_upstream_log_config() {
        let mut lock = MUTEX.lock();
        let config = r#"
            KALDB_UPSTREAM_LOG_BOOTSTRAP_SERVERS="localhost:9092"
            KALDB_UPSTREAM_LOG_TOPIC="test-topic"
            KALDB_UPSTREAM_LOG_CLIENT_GROUP="kaldb-test"
            KALDB_UPSTREAM_LOG_MODE="InMemory"
        "#;
        lock.set_env(config);

        let config = load_upstream_log_config().expect("failed to load upstream log config");
        assert_eq!(config, default_upstream_log_config());
    }
}
