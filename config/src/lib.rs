use serde::de::DeserializeOwned;

pub mod api;
pub mod indexer;
pub mod manager;
pub mod metadata_store;
pub mod node;
pub mod object_store;
pub mod upstream_log;

pub fn envy_load<T: DeserializeOwned>(name: &str, prefix: &str) -> T {
    envy_try_load(prefix).unwrap_or_else(|_| {
        panic!("Cannot load config <{}>: {}", name, prefix);
    })
}

pub fn envy_try_load<T: DeserializeOwned>(prefix: &str) -> Result<T, envy::Error> {
    envy::prefixed(prefix).from_env()
}

/// Loads a config section from an optional file under `config/configuration/`
/// overridden by environment variables carrying the given prefix.
pub fn load_config<T: DeserializeOwned>(path: &str, prefix: &str) -> Result<T, config::ConfigError> {
    let mut settings = config::Config::default();
    settings.merge(config::File::with_name(path).required(false))?;
    settings.merge(config::Environment::with_prefix(prefix))?;
    settings.try_into()
}
