//! Representations of virtual machine and its status.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Status of virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    Initializing,
    Running,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Initializing => write!(f, "initializing"),
            VmStatus::Running => write!(f, "running"),
        }
    }
}

/// Resource shape of a VM to be spawned.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VmSpec {
    pub name: String,
    /// Number of virtual cores.
    pub cpu_cores: u32,
    /// Per-core processing speed in instructions per millisecond.
    pub core_speed: f64,
    /// Memory size in bytes.
    pub memory: u64,
    /// Time in seconds between placement and the VM becoming ready.
    pub startup_delay: f64,
}

impl VmSpec {
    /// Maximum processing rate in instructions per second when all cores are fully used.
    pub fn max_rate(&self) -> f64 {
        self.cpu_cores as f64 * self.core_speed * 1000.
    }
}

/// Represents a virtual machine placed on a host.
#[derive(Clone, Debug, Serialize)]
pub struct VirtualMachine {
    pub id: u32,
    pub spec: VmSpec,
    pub host_id: u32,
    pub status: VmStatus,
    pub start_time: Option<f64>,
}

impl VirtualMachine {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}
