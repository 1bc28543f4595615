//! Submission of per-minute work units and accounting of their completion.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use serde::Serialize;

use twin_cloud::core::events::compute::TaskCompleted;
use twin_cloud::core::events::transfer::{DataTransferCompleted, DataTransferFailed};
use twin_cloud::core::network::Network;
use twin_cloud::{CloudError, CloudSimulation};
use twin_core::{cast, log_debug, log_error, log_trace};
use twin_core::{Event, EventHandler, Id, SimulationContext};

use crate::error::RunFailure;
use crate::metrics::MetricsAccumulator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmRole {
    Primary,
    Backup,
}

impl Display for VmRole {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmRole::Primary => write!(f, "primary"),
            VmRole::Backup => write!(f, "backup"),
        }
    }
}

/// VM that receives work units.
#[derive(Clone, Debug, Serialize)]
pub struct VmHandle {
    pub name: String,
    pub vm_id: u32,
    pub role: VmRole,
    /// Bytes moved to another repository after each completed unit.
    pub data_since_last_save: u64,
}

/// Work of one VM for one forecast minute.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkUnit {
    pub minute: usize,
    pub instructions: u64,
    pub idle_fraction: f64,
    /// Amount added to the task counter once the unit completes.
    pub task_credit: u64,
}

/// Dispatched unit, kept for inspection.
#[derive(Clone, Debug, Serialize)]
pub struct DispatchRecord {
    pub task_id: u64,
    pub vm_name: String,
    pub vm_id: u32,
    pub role: VmRole,
    pub unit: WorkUnit,
    pub time: f64,
}

struct PendingUnit {
    vm_name: String,
    task_credit: u64,
    data_size: u64,
}

pub struct TaskDispatcher {
    pending: HashMap<u64, PendingUnit>,
    dispatched: Vec<DispatchRecord>,
    faults: Vec<RunFailure>,
    metrics: Rc<RefCell<MetricsAccumulator>>,
    network: Rc<RefCell<Network>>,
    ctx: SimulationContext,
}

impl TaskDispatcher {
    pub fn new(
        metrics: Rc<RefCell<MetricsAccumulator>>,
        network: Rc<RefCell<Network>>,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            pending: HashMap::new(),
            dispatched: Vec::new(),
            faults: Vec::new(),
            metrics,
            network,
            ctx,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    /// Submits the unit as a compute task on the VM, returns the task id.
    ///
    /// Counters are not touched until the task completes.
    pub fn dispatch(
        &mut self,
        cloud: &mut CloudSimulation,
        vm: &VmHandle,
        unit: WorkUnit,
    ) -> Result<u64, CloudError> {
        let task_id = cloud.submit_task(vm.vm_id, unit.instructions, unit.idle_fraction, self.ctx.id())?;
        log_trace!(
            self.ctx,
            "minute {} of {} {}: task #{} with {} instructions, idle {:.3}",
            unit.minute,
            vm.role,
            vm.name,
            task_id,
            unit.instructions,
            unit.idle_fraction
        );
        self.pending.insert(
            task_id,
            PendingUnit {
                vm_name: vm.name.clone(),
                task_credit: unit.task_credit,
                data_size: vm.data_since_last_save,
            },
        );
        self.dispatched.push(DispatchRecord {
            task_id,
            vm_name: vm.name.clone(),
            vm_id: vm.vm_id,
            role: vm.role,
            unit,
            time: self.ctx.time(),
        });
        Ok(task_id)
    }

    fn on_task_completed(&mut self, task_id: u64, host_id: u32) {
        let unit = match self.pending.remove(&task_id) {
            Some(unit) => unit,
            None => {
                log_debug!(self.ctx, "ignoring completion of unknown task #{}", task_id);
                return;
            }
        };
        if let Err(err) = self.start_transfer(host_id, unit.data_size) {
            log_error!(self.ctx, "can't save data of {}: {}", unit.vm_name, err);
            self.faults.push(err.into());
            return;
        }
        let mut metrics = self.metrics.borrow_mut();
        metrics.add_moved_data(unit.data_size);
        metrics.add_tasks(unit.task_credit);
    }

    fn start_transfer(&mut self, host_id: u32, size: u64) -> Result<u64, CloudError> {
        let mut network = self.network.borrow_mut();
        let src = network
            .host_repository(host_id)
            .map(str::to_string)
            .ok_or_else(|| CloudError::UnknownRepository(format!("host #{}", host_id)))?;
        let dst = network.pick_target(&src)?;
        network.transfer_data(&src, &dst, size, self.ctx.id())
    }

    pub fn dispatched(&self) -> &[DispatchRecord] {
        &self.dispatched
    }

    /// Number of dispatched units that have not completed yet.
    pub fn pending_units(&self) -> usize {
        self.pending.len()
    }

    pub fn faults(&self) -> &[RunFailure] {
        &self.faults
    }
}

impl EventHandler for TaskDispatcher {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            TaskCompleted {
                task_id,
                vm_id: _,
                host_id,
                instructions: _,
            } => {
                self.on_task_completed(task_id, host_id);
            }
            DataTransferCompleted { transfer } => {
                log_trace!(self.ctx, "data transfer {} to {} completed", transfer.id, transfer.dst);
            }
            DataTransferFailed { transfer, reason } => {
                log_error!(self.ctx, "data transfer {} failed: {}", transfer.id, reason);
                self.faults.push(RunFailure::TransferFailed {
                    transfer_id: transfer.id,
                    reason,
                });
            }
        })
    }
}
