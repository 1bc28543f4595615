//! Twin configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use twin_cloud::core::config::CloudConfig;

/// Error raised while loading configuration or input files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("can't parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn read_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawForecasterConfig {
    program: Option<String>,
    script: Option<String>,
}

/// Holds raw twin config parsed from YAML, all parameters are optional.
#[derive(Debug, Default, Deserialize)]
struct RawTwinConfig {
    default_physical_machines: Option<u32>,
    scaling_physical_machines: Option<u32>,
    reading_interval: Option<u32>,
    aggregation_threads: Option<usize>,
    ram_cost_per_gb_hour: Option<f64>,
    cpu_cost_per_core_hour: Option<f64>,
    forecaster: Option<RawForecasterConfig>,
    cloud: Option<CloudConfig>,
}

/// External forecasting program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecasterConfig {
    /// Interpreter or executable to run.
    pub program: String,
    /// Script passed as the first argument.
    pub script: String,
}

/// Represents twin configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTwinConfig")]
pub struct TwinConfig {
    /// Number of hosts for baseline and no-scaling runs.
    pub default_physical_machines: u32,
    /// Number of hosts for runs with scaling, leaves room for backup VMs.
    pub scaling_physical_machines: u32,
    /// Interval between forecast readings in seconds.
    pub reading_interval: u32,
    /// Worker threads used to aggregate forecasts.
    pub aggregation_threads: usize,
    /// Price of 1 GiB of VM memory per hour in USD.
    pub ram_cost_per_gb_hour: f64,
    /// Price of one VM core per hour in USD.
    pub cpu_cost_per_core_hour: f64,
    pub forecaster: ForecasterConfig,
    /// Infrastructure parameters.
    pub cloud: CloudConfig,
}

impl From<RawTwinConfig> for TwinConfig {
    fn from(raw: RawTwinConfig) -> Self {
        let forecaster = raw.forecaster.unwrap_or_default();
        Self {
            default_physical_machines: raw.default_physical_machines.unwrap_or(1),
            scaling_physical_machines: raw.scaling_physical_machines.unwrap_or(2),
            reading_interval: raw.reading_interval.unwrap_or(5),
            aggregation_threads: raw.aggregation_threads.unwrap_or(4),
            ram_cost_per_gb_hour: raw.ram_cost_per_gb_hour.unwrap_or(0.005),
            cpu_cost_per_core_hour: raw.cpu_cost_per_core_hour.unwrap_or(0.05),
            forecaster: ForecasterConfig {
                program: forecaster.program.unwrap_or_else(|| "python".to_string()),
                script: forecaster.script.unwrap_or_else(|| "scripts/prediction_new.py".to_string()),
            },
            cloud: raw.cloud.unwrap_or_default(),
        }
    }
}

impl Default for TwinConfig {
    fn default() -> Self {
        RawTwinConfig::default().into()
    }
}

impl TwinConfig {
    /// Parses config from YAML string, absent parameters get default values.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Creates config by reading parameter values from YAML file.
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        Self::from_yaml(&read_file(file_name)?)
    }

    /// Number of forecast readings that make up one minute.
    pub fn readings_per_minute(&self) -> usize {
        (60 / self.reading_interval.max(1)).max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TwinConfig::default();
        assert_eq!(config.default_physical_machines, 1);
        assert_eq!(config.scaling_physical_machines, 2);
        assert_eq!(config.readings_per_minute(), 12);
        assert_eq!(config.cloud, CloudConfig::default());
        assert_eq!(config.forecaster.program, "python");
    }

    #[test]
    fn test_partial_yaml() {
        let config = TwinConfig::from_yaml("reading_interval: 10\ncloud:\n  host:\n    cores: 4\n").unwrap();
        assert_eq!(config.readings_per_minute(), 6);
        assert_eq!(config.cloud.host.cores, 4);
        assert_eq!(config.cloud.host.max_power, 200.);
        assert_eq!(config.ram_cost_per_gb_hour, 0.005);
    }

    #[test]
    fn test_oversized_interval_keeps_one_reading_per_minute() {
        let config = TwinConfig::from_yaml("reading_interval: 120").unwrap();
        assert_eq!(config.readings_per_minute(), 1);
    }
}
