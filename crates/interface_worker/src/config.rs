//! Worker configuration

use std::time::Duration;

use serde::Deserialize;

use infra_db::DatabaseConfig;

/// Worker configuration
///
/// Every field can be set through a `WORKER_`-prefixed environment variable,
/// e.g. `WORKER_TICK_INTERVAL_SECS=60`. Unset fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Database URL
    pub database_url: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// Seconds between two ticks
    pub tick_interval_secs: u64,
    /// Run a tick immediately instead of waiting one interval
    pub run_on_start: bool,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/ledgerlight".to_string(),
            max_connections: 5,
            tick_interval_secs: 300,
            run_on_start: true,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix("WORKER"))
    }

    /// Loads configuration from any `config` source layered over the defaults
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: WorkerConfig = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "tick_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(config::ConfigError::Message(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Pool settings for this worker
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_url)
            .max_connections(self.max_connections)
            .min_connections(1)
    }
}
