use std::time::Duration;

use serde::Deserialize;

use crate::load_config;

/// Configuration for the cluster manager's periodic services.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManagerConfig {
    /// Period of the recovery-task assignment cycle.
    #[serde(default = "ManagerConfig::default_schedule_period_mins")]
    pub schedule_period_mins: u64,
    /// Snapshots whose end time is older than this are pruned.
    #[serde(default = "ManagerConfig::default_snapshot_lifespan_hours")]
    pub snapshot_lifespan_hours: u64,
}

impl ManagerConfig {
    const fn default_schedule_period_mins() -> u64 {
        1
    }

    const fn default_snapshot_lifespan_hours() -> u64 {
        7 * 24
    }

    pub fn schedule_period(&self) -> Duration {
        Duration::from_secs(self.schedule_period_mins * 60)
    }

    pub fn snapshot_lifespan(&self) -> Duration {
        Duration::from_secs(self.snapshot_lifespan_hours * 3_600)
    }
}

pub fn load_manager_config() -> Result<ManagerConfig, config::ConfigError> {
    load_config("config/configuration/manager", "KALDB_MANAGER")
}

#[cfg(test)]
mod tests {
    use crate::utils::tests::EnvMutex;

    use super::{load_manager_config, ManagerConfig};

    static MUTEX: EnvMutex = EnvMutex::new();

    #[test]
    fn test_load_manager_config() {
        let mut lock = MUTEX.lock();
        let config = r#"
            KALDB_MANAGER_SCHEDULE_PERIOD_MINS="5"
            KALDB_MANAGER_SNAPSHOT_LIFESPAN_HOURS="72"
        "#;
        lock.set_env(config);

        let config = load_manager_config().expect("failed to load manager config");
        assert_eq!(
            config,
            ManagerConfig {
                schedule_period_mins: 5,
                snapshot_lifespan_hours: 72,
            }
        );
        assert_eq!(config.schedule_period().as_secs(), 300);
    }

    #[test]
    fn test_manager_config_defaults() {
        let mut lock = MUTEX.lock();
        lock.remove_env(&[
            "KALDB_MANAGER_SCHEDULE_PERIOD_MINS",
            "KALDB_MANAGER_SNAPSHOT_LIFESPAN_HOURS",
        ]);

        let config = load_manager_config().expect("failed to load manager config");
        assert_eq!(config.schedule_period_mins, 1);
        assert_eq!(config.snapshot_lifespan_hours, 168);
    }
}
