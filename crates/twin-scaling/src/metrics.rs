//! Run-wide resource counters.

use serde::Serialize;

pub const BYTES_PER_MB: f64 = 1_048_576.;
pub const JOULES_PER_KWH: f64 = 3_600_000.;

/// Counters collected during one run. All of them only grow.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsAccumulator {
    energy_kwh: f64,
    moved_data_mb: f64,
    tasks: u64,
    vm_count: u32,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds energy given in joules.
    pub fn add_energy(&mut self, joules: f64) {
        self.energy_kwh += joules.max(0.) / JOULES_PER_KWH;
    }

    /// Adds moved data given in bytes.
    pub fn add_moved_data(&mut self, bytes: u64) {
        self.moved_data_mb += bytes as f64 / BYTES_PER_MB;
    }

    pub fn add_tasks(&mut self, count: u64) {
        self.tasks += count;
    }

    pub fn add_vms(&mut self, count: u32) {
        self.vm_count += count;
    }

    pub fn energy_kwh(&self) -> f64 {
        self.energy_kwh
    }

    pub fn moved_data_mb(&self) -> f64 {
        self.moved_data_mb
    }

    pub fn tasks(&self) -> u64 {
        self.tasks
    }

    pub fn vm_count(&self) -> u32 {
        self.vm_count
    }
}
