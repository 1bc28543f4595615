//! VM profiles and run requests.

use serde::{Deserialize, Serialize};

use twin_cloud::core::vm::VmSpec;

use crate::config::{read_file, ConfigError};

/// Static description of one VM of the tenant fleet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VmProfile {
    pub name: String,
    /// Number of cores.
    pub cpu: u32,
    /// Per-core processing power in instructions per millisecond.
    pub core_processing_power: f64,
    /// Memory in bytes.
    pub ram: u64,
    /// Disk in bytes.
    #[serde(default)]
    pub disk: u64,
    #[serde(default)]
    pub network_traffic: u64,
    /// Startup delay in seconds.
    #[serde(default)]
    pub startup_delay: f64,
    /// Last observed usage in percent.
    #[serde(default)]
    pub usage: f64,
    /// Bytes written since the last save, moved after every completed task.
    #[serde(default)]
    pub data_since_last_save: u64,
}

impl VmProfile {
    /// Rated processing capacity in instructions per second.
    pub fn max_instructions_per_second(&self) -> u64 {
        (self.cpu as f64 * self.core_processing_power * 1000.) as u64
    }

    pub fn vm_spec(&self) -> VmSpec {
        VmSpec {
            name: self.name.clone(),
            cpu_cores: self.cpu,
            core_speed: self.core_processing_power,
            memory: self.ram,
            startup_delay: self.startup_delay,
        }
    }

    /// Profile of the backup VM: same resources, `_backup` name suffix, no startup delay.
    pub fn backup(&self) -> VmProfile {
        VmProfile {
            name: format!("{}_backup", self.name),
            startup_delay: 0.,
            ..self.clone()
        }
    }

    /// Reads a JSON array of profiles.
    pub fn load_all(path: &str) -> Result<Vec<VmProfile>, ConfigError> {
        Ok(serde_json::from_str(&read_file(path)?)?)
    }
}

/// Parameters of a single twin request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Simulated horizon in minutes.
    pub prediction_length: u32,
    /// Normalized load (0-1) at or above which a VM gets a backup.
    pub threshold: f64,
    /// Forecast feature, e.g. `cpu`.
    #[serde(default = "default_feature")]
    pub feature_name: String,
    /// History length in minutes the forecast is based on.
    #[serde(default = "default_based_on_last")]
    pub based_on_last: u32,
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    /// Forecasting model: `lr`, `arima` or `rf`.
    #[serde(default = "default_model")]
    pub model_type: String,
}

fn default_feature() -> String {
    "cpu".to_string()
}

fn default_based_on_last() -> u32 {
    60
}

fn default_tenant() -> String {
    "default".to_string()
}

fn default_model() -> String {
    "arima".to_string()
}

impl RunRequest {
    pub fn new(prediction_length: u32, threshold: f64) -> Self {
        Self {
            prediction_length,
            threshold,
            feature_name: default_feature(),
            based_on_last: default_based_on_last(),
            tenant_id: default_tenant(),
            model_type: default_model(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web1() -> VmProfile {
        VmProfile {
            name: "web1".to_string(),
            cpu: 2,
            core_processing_power: 500.,
            ram: 4 << 30,
            disk: 0,
            network_traffic: 0,
            startup_delay: 30.,
            usage: 50.,
            data_since_last_save: 1 << 20,
        }
    }

    #[test]
    fn test_max_instructions_per_second() {
        assert_eq!(web1().max_instructions_per_second(), 1_000_000);
    }

    #[test]
    fn test_backup_profile() {
        let backup = web1().backup();
        assert_eq!(backup.name, "web1_backup");
        assert_eq!(backup.startup_delay, 0.);
        assert_eq!(backup.cpu, 2);
        assert_eq!(backup.ram, 4 << 30);
    }

    #[test]
    fn test_profile_json_defaults() {
        let profile: VmProfile =
            serde_json::from_str(r#"{"name": "db", "cpu": 4, "core_processing_power": 1.5, "ram": 1024}"#).unwrap();
        assert_eq!(profile.usage, 0.);
        assert_eq!(profile.max_instructions_per_second(), 6000);
    }
}
