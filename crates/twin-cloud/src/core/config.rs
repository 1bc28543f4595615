//! Configuration of the cloud infrastructure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const GIB: u64 = 1 << 30;

/// Error raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Deserialize)]
struct RawHostConfig {
    cores: Option<u32>,
    memory: Option<u64>,
    idle_power: Option<f64>,
    max_power: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRepositoryConfig {
    capacity: Option<u64>,
    bandwidth: Option<f64>,
}

/// Holds raw cloud config parsed from YAML, all parameters are optional.
#[derive(Debug, Default, Deserialize)]
struct RawCloudConfig {
    message_delay: Option<f64>,
    network_latency: Option<f64>,
    host: Option<RawHostConfig>,
    repository: Option<RawRepositoryConfig>,
}

/// Parameters shared by all physical hosts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostConfig {
    /// Number of CPU cores.
    pub cores: u32,
    /// Memory capacity in bytes.
    pub memory: u64,
    /// Power consumption of idle host in watts.
    pub idle_power: f64,
    /// Power consumption of fully loaded host in watts.
    pub max_power: f64,
}

/// Parameters shared by all storage repositories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryConfig {
    /// Storage capacity in bytes.
    pub capacity: u64,
    /// Transfer bandwidth in bytes per second.
    pub bandwidth: f64,
}

/// Represents the infrastructure configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCloudConfig")]
pub struct CloudConfig {
    /// Delay in seconds for control messages (e.g. VM allocation requests).
    pub message_delay: f64,
    /// Latency in seconds between any two repositories.
    pub network_latency: f64,
    /// Host parameters.
    pub host: HostConfig,
    /// Repository parameters.
    pub repository: RepositoryConfig,
}

impl From<RawCloudConfig> for CloudConfig {
    fn from(raw: RawCloudConfig) -> Self {
        let host = raw.host.unwrap_or_default();
        let repository = raw.repository.unwrap_or_default();
        Self {
            message_delay: raw.message_delay.unwrap_or(0.2),
            network_latency: raw.network_latency.unwrap_or(0.1),
            host: HostConfig {
                cores: host.cores.unwrap_or(8),
                memory: host.memory.unwrap_or(16 * GIB),
                idle_power: host.idle_power.unwrap_or(20.),
                max_power: host.max_power.unwrap_or(200.),
            },
            repository: RepositoryConfig {
                capacity: repository.capacity.unwrap_or(100 * GIB),
                bandwidth: repository.bandwidth.unwrap_or(12_500_000.),
            },
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        RawCloudConfig::default().into()
    }
}

impl CloudConfig {
    /// Parses config from YAML string, absent parameters get default values.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Creates config by reading parameter values from YAML file.
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }
}
