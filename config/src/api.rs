use std::net::SocketAddr;

use serde::Deserialize;

use crate::{envy_load, load_config};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HealthCheckConfig {
    /// Port the health endpoint listens on.
    pub port: u16,
}

impl HealthCheckConfig {
    pub fn from_env() -> Self {
        envy_load("healthcheck", "KALDB_HEALTH_CHECK_")
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new("0.0.0.0".parse().unwrap(), self.port)
    }
}

pub fn load_healthcheck_config() -> Result<HealthCheckConfig, config::ConfigError> {
    load_config("config/configuration/health_check", "KALDB_HEALTH_CHECK")
}

#[cfg(test)]
mod tests {
    use crate::utils::tests::EnvMutex;

    use super::{load_healthcheck_config, HealthCheckConfig};

    static MUTEX: EnvMutex = EnvMutex::new();

    #[test]
    fn test_load_healthcheck_config() {
        let mut lock = MUTEX.lock();
        let config = r#"
            KALDB_HEALTH_CHECK_PORT=8081
        "#;
        lock.set_env(config);

        let config = load_healthcheck_config().expect("failed to load health check config");
        assert_eq!(config, HealthCheckConfig { port: 8081 });
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8081");
        assert_eq!(HealthCheckConfig::from_env(), config);
    }
}
