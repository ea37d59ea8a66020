use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// SMF daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SmfConfig {
    #[validate(length(min = 1))]
    pub service_name: String,
    #[validate(length(min = 1))]
    pub log_level: String,
    #[validate(range(min = 1, max = 65535))]
    pub metrics_port: u16,

    /// S5-C/S11 GTP-C bind address
    pub gtpc_addr: SocketAddr,
    /// N4 PFCP bind address
    pub pfcp_addr: SocketAddr,

    /// Deadline for a Credit-Control answer before the parked request is dropped
    #[validate(range(min = 100, max = 60000))]
    pub policy_answer_timeout_ms: u64,
    /// Deadline for a transaction a handler leaves open
    #[validate(range(min = 100, max = 60000))]
    pub transaction_timeout_ms: u64,
    /// Inbound event queue depth
    #[validate(range(min = 1, max = 65536))]
    pub event_queue_depth: usize,
}

impl Default for SmfConfig {
    fn default() -> Self {
        Self {
            service_name: "smfd".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
            gtpc_addr: SocketAddr::from(([0, 0, 0, 0], 2123)),
            pfcp_addr: SocketAddr::from(([0, 0, 0, 0], 8805)),
            policy_answer_timeout_ms: 5000,
            transaction_timeout_ms: 10000,
            event_queue_depth: 1024,
        }
    }
}

impl SmfConfig {
    pub fn policy_answer_timeout(&self) -> Duration {
        Duration::from_millis(self.policy_answer_timeout_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }
}

/// Load configuration from file, with `SMFC_` environment overrides
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("SMFC"))
        .build()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?;

    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

/// Load configuration from YAML string (for testing)
pub fn load_from_yaml<T>(yaml: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::LoadError(e.to_string()))?;
    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}
