use std::time::Duration;

use kaldb_basic_types::NodeRole;
use serde::Deserialize;

use crate::load_config;

/// Per-process node identity and role selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeConfig {
    pub role: NodeRole,
    /// Unique name of this node instance within the cluster.
    pub name: String,
    #[serde(default = "NodeConfig::default_data_dir")]
    pub data_dir: String,
    /// Timeout applied to individual blob and upstream-log operations.
    #[serde(default = "NodeConfig::default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

impl NodeConfig {
    fn default_data_dir() -> String {
        "./data".to_owned()
    }

    const fn default_operation_timeout_secs() -> u64 {
        300
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

pub fn load_node_config() -> Result<NodeConfig, config::ConfigError> {
    load_config("config/configuration/node", "KALDB_NODE")
}

#[cfg(test)]
mod tests {
    use kaldb_basic_types::NodeRole;

    use crate::utils::tests::EnvMutex;

    use super::{load_node_config, NodeConfig};

    static MUTEX: EnvMutex = EnvMutex::new();

    fn default_node_config() -> NodeConfig {
        NodeConfig {
            role: NodeRole::Recovery,
            name: "recoveryNode_localhost".to_string(),
            data_dir: "/tmp/kaldb".to_string(),
            operation_timeout_secs: 300,
        }
    }

    #[test]
    fn test_load_node_config() {
        let mut lock = MUTEX.lock();
        let config = r#"
            KALDB_NODE_ROLE="RECOVERY"
            KALDB_NODE_NAME="recoveryNode_localhost"
            KALDB_NODE_DATA_DIR="/tmp/kaldb"
        "#;
        lock.set_env(config);

        let config = load_node_config().expect("failed to load node config");
        assert_eq!(config, default_node_config());
    }
}
