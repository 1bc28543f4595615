//! Run cost and the final report.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::TwinConfig;
use crate::metrics::MetricsAccumulator;
use crate::profile::VmProfile;

const BYTES_PER_GIB: f64 = 1_073_741_824.;

/// Pricing of VM resources.
#[derive(Clone, Debug, PartialEq)]
pub struct CostModel {
    pub ram_cost_per_gb_hour: f64,
    pub cpu_cost_per_core_hour: f64,
}

impl CostModel {
    pub fn from_config(config: &TwinConfig) -> Self {
        Self {
            ram_cost_per_gb_hour: config.ram_cost_per_gb_hour,
            cpu_cost_per_core_hour: config.cpu_cost_per_core_hour,
        }
    }

    /// Cost of running one VM for the given number of hours.
    pub fn vm_cost(&self, profile: &VmProfile, hours: f64) -> f64 {
        let ram_gb = profile.ram as f64 / BYTES_PER_GIB;
        (ram_gb * self.ram_cost_per_gb_hour + profile.cpu as f64 * self.cpu_cost_per_core_hour) * hours
    }

    /// Cost of the fleet, VMs listed in `backed_up` are paid twice.
    pub fn total_cost(&self, profiles: &[&VmProfile], backed_up: &BTreeSet<String>, hours: f64) -> f64 {
        profiles
            .iter()
            .map(|profile| {
                let cost = self.vm_cost(profile, hours);
                if backed_up.contains(&profile.name) {
                    2. * cost
                } else {
                    cost
                }
            })
            .sum()
    }
}

/// Outcome of one strategy run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub runtime_ms: u64,
    pub runtime_minutes: f64,
    pub runtime_hours: f64,
    pub total_iot_cost_usd: f64,
    pub total_energy_consumption_kwh: f64,
    pub total_moved_data_mb: f64,
    pub total_vm_tasks_simulated: u64,
    pub number_of_vms_utilized: u32,
}

impl RunReport {
    pub fn new(runtime_ms: u64, cost: f64, metrics: &MetricsAccumulator) -> Self {
        Self {
            runtime_ms,
            runtime_minutes: runtime_ms as f64 / 60_000.,
            runtime_hours: runtime_ms as f64 / 3_600_000.,
            total_iot_cost_usd: cost,
            total_energy_consumption_kwh: metrics.energy_kwh(),
            total_moved_data_mb: metrics.moved_data_mb(),
            total_vm_tasks_simulated: metrics.tasks(),
            number_of_vms_utilized: metrics.vm_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, cpu: u32, ram_gb: u64) -> VmProfile {
        VmProfile {
            name: name.to_string(),
            cpu,
            core_processing_power: 1.,
            ram: ram_gb << 30,
            disk: 0,
            network_traffic: 0,
            startup_delay: 0.,
            usage: 0.,
            data_since_last_save: 0,
        }
    }

    #[test]
    fn test_cost_doubles_for_backed_up_vms() {
        let model = CostModel::from_config(&TwinConfig::default());
        let web = profile("web1", 2, 4);
        let db = profile("db", 4, 8);
        // 4 * 0.005 + 2 * 0.05 = 0.12 per hour
        assert!((model.vm_cost(&web, 1.) - 0.12).abs() < 1e-12);

        let backed_up = BTreeSet::from(["web1".to_string()]);
        let total = model.total_cost(&[&web, &db], &backed_up, 0.5);
        let expected = 2. * 0.12 * 0.5 + (8. * 0.005 + 4. * 0.05) * 0.5;
        assert!((total - expected).abs() < 1e-12);
    }

    #[test]
    fn test_report_field_order() {
        let report = RunReport::new(120_000, 0.5, &MetricsAccumulator::new());
        let json = serde_json::to_string(&report).unwrap();
        let keys = [
            "runtime_ms",
            "runtime_minutes",
            "runtime_hours",
            "total_iot_cost_usd",
            "total_energy_consumption_kwh",
            "total_moved_data_mb",
            "total_vm_tasks_simulated",
            "number_of_vms_utilized",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(report.runtime_minutes, 2.);
    }
}
