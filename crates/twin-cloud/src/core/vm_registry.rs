//! Shared registry of all VMs in the cloud.

use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::core::error::CloudError;
use crate::core::vm::{VirtualMachine, VmSpec, VmStatus};

/// Keeps VM records and their statuses.
///
/// Shared between the hosts (which update statuses) and the cloud facade (which registers VMs
/// and answers queries).
#[derive(Default)]
pub struct VmRegistry {
    vms: BTreeMap<u32, VirtualMachine>,
    name_to_id: HashMap<String, u32>,
    next_id: u32,
}

impl VmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: VmSpec, host_id: u32) -> Result<u32, CloudError> {
        if self.name_to_id.contains_key(&spec.name) {
            return Err(CloudError::DuplicateName(spec.name));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.name_to_id.insert(spec.name.clone(), id);
        self.vms.insert(
            id,
            VirtualMachine {
                id,
                spec,
                host_id,
                status: VmStatus::Initializing,
                start_time: None,
            },
        );
        Ok(id)
    }

    pub fn get(&self, vm_id: u32) -> Result<&VirtualMachine, CloudError> {
        self.vms.get(&vm_id).ok_or(CloudError::UnknownVm(vm_id))
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    pub fn status(&self, vm_id: u32) -> Option<VmStatus> {
        self.vms.get(&vm_id).map(|vm| vm.status)
    }

    pub fn set_status(&mut self, vm_id: u32, status: VmStatus, time: f64) {
        if let Some(vm) = self.vms.get_mut(&vm_id) {
            vm.status = status;
            if status == VmStatus::Running {
                vm.start_time = Some(time);
            }
        }
    }

    /// Iterates over VMs in the order of their creation.
    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }

    pub fn count(&self) -> usize {
        self.vms.len()
    }
}
