//! Physical host: VM placement bookkeeping, task execution and energy accounting.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

use serde::Serialize;

use twin_core::{cast, log_debug, log_info, log_trace};
use twin_core::{Event, EventHandler, Id, SimulationContext};

use crate::core::config::HostConfig;
use crate::core::energy_meter::EnergyMeter;
use crate::core::error::CloudError;
use crate::core::events::allocation::AllocationRequest;
use crate::core::events::compute::{TaskCompleted, TaskFinished};
use crate::core::events::vm::VmStarted;
use crate::core::power_model::PowerModel;
use crate::core::vm::{VmSpec, VmStatus};
use crate::core::vm_registry::VmRegistry;

/// Lower bound of the CPU share used by a task, so that tasks with zero requested load still finish.
pub const MIN_TASK_UTILIZATION: f64 = 0.01;

/// A unit of compute work submitted to a VM.
#[derive(Clone, Debug, Serialize)]
pub struct ComputeTask {
    pub id: u64,
    pub vm_id: u32,
    pub instructions: u64,
    /// Share of the VM cores used by the task, in range (0, 1].
    pub utilization: f64,
    pub requester: Id,
}

impl ComputeTask {
    /// Builds a task from the fraction of time the VM is expected to stay idle.
    pub fn new(id: u64, vm_id: u32, instructions: u64, idle_fraction: f64, requester: Id) -> Self {
        Self {
            id,
            vm_id,
            instructions,
            utilization: (1. - idle_fraction).clamp(MIN_TASK_UTILIZATION, 1.),
            requester,
        }
    }
}

struct RunningTask {
    task: ComputeTask,
    cores_used: f64,
}

pub struct HostManager {
    pub id: u32,

    cpu_total: u32,
    cpu_allocated: u32,
    memory_total: u64,
    memory_allocated: u64,

    vms: BTreeSet<u32>,
    queues: HashMap<u32, VecDeque<ComputeTask>>,
    running: HashMap<u32, RunningTask>,
    completed_tasks: u64,

    power_model: Box<dyn PowerModel>,
    energy_meter: EnergyMeter,
    vm_registry: Rc<RefCell<VmRegistry>>,

    ctx: SimulationContext,
}

impl HostManager {
    pub fn new(
        config: &HostConfig,
        power_model: Box<dyn PowerModel>,
        vm_registry: Rc<RefCell<VmRegistry>>,
        ctx: SimulationContext,
    ) -> Self {
        let mut energy_meter = EnergyMeter::new();
        energy_meter.update(ctx.time(), power_model.get_power(ctx.time(), 0.));
        Self {
            id: ctx.id(),
            cpu_total: config.cores,
            cpu_allocated: 0,
            memory_total: config.memory,
            memory_allocated: 0,
            vms: BTreeSet::new(),
            queues: HashMap::new(),
            running: HashMap::new(),
            completed_tasks: 0,
            power_model,
            energy_meter,
            vm_registry,
            ctx,
        }
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn can_allocate(&self, spec: &VmSpec) -> bool {
        self.cpu_total - self.cpu_allocated >= spec.cpu_cores
            && self.memory_total - self.memory_allocated >= spec.memory
    }

    /// Reserves host resources for the VM.
    pub fn allocate(&mut self, vm_id: u32, spec: &VmSpec) {
        self.cpu_allocated += spec.cpu_cores;
        self.memory_allocated += spec.memory;
        self.vms.insert(vm_id);
        log_debug!(
            self.ctx,
            "reserved {} cores and {} bytes for vm #{}",
            spec.cpu_cores,
            spec.memory,
            vm_id
        );
    }

    /// Enqueues the task to the VM, tasks of one VM are executed one after another.
    pub fn submit(&mut self, task: ComputeTask) -> Result<(), CloudError> {
        let status = self
            .vm_registry
            .borrow()
            .status(task.vm_id)
            .ok_or(CloudError::UnknownVm(task.vm_id))?;
        if !self.vms.contains(&task.vm_id) {
            return Err(CloudError::UnknownVm(task.vm_id));
        }
        if status != VmStatus::Running {
            return Err(CloudError::VmNotRunning {
                vm_id: task.vm_id,
                status: status.to_string(),
            });
        }
        log_trace!(
            self.ctx,
            "vm #{} got task #{} with {} instructions",
            task.vm_id,
            task.id,
            task.instructions
        );
        let vm_id = task.vm_id;
        self.queues.entry(vm_id).or_default().push_back(task);
        if !self.running.contains_key(&vm_id) {
            self.start_next_task(vm_id);
        }
        Ok(())
    }

    fn start_next_task(&mut self, vm_id: u32) {
        let task = match self.queues.get_mut(&vm_id).and_then(|q| q.pop_front()) {
            Some(task) => task,
            None => return,
        };
        let spec = match self.vm_registry.borrow().get(vm_id) {
            Ok(vm) => vm.spec.clone(),
            Err(_) => return,
        };
        let rate = task.utilization * spec.max_rate();
        let duration = if rate > 0. { task.instructions as f64 / rate } else { 0. };
        self.ctx.emit_self(
            TaskFinished {
                task_id: task.id,
                vm_id,
            },
            duration,
        );
        self.running.insert(
            vm_id,
            RunningTask {
                cores_used: task.utilization * spec.cpu_cores as f64,
                task,
            },
        );
        self.update_energy();
    }

    fn on_task_finished(&mut self, task_id: u64, vm_id: u32) {
        if self.running.get(&vm_id).map(|r| r.task.id) != Some(task_id) {
            return;
        }
        let running = match self.running.remove(&vm_id) {
            Some(running) => running,
            None => return,
        };
        self.completed_tasks += 1;
        self.update_energy();
        log_trace!(self.ctx, "vm #{} completed task #{}", vm_id, task_id);
        self.ctx.emit_now(
            TaskCompleted {
                task_id,
                vm_id,
                host_id: self.id,
                instructions: running.task.instructions,
            },
            running.task.requester,
        );
        self.start_next_task(vm_id);
    }

    fn update_energy(&mut self) {
        let time = self.ctx.time();
        let power = self.power_model.get_power(time, self.cpu_load());
        self.energy_meter.update(time, power);
    }

    /// Current CPU load in range [0, 1].
    pub fn cpu_load(&self) -> f64 {
        let used: f64 = self.running.values().map(|t| t.cores_used).sum();
        (used / self.cpu_total as f64).min(1.)
    }

    pub fn cpu_allocated(&self) -> u32 {
        self.cpu_allocated
    }

    pub fn memory_allocated(&self) -> u64 {
        self.memory_allocated
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    /// Number of queued and running tasks.
    pub fn pending_tasks(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum::<usize>() + self.running.len()
    }

    pub fn completed_tasks(&self) -> u64 {
        self.completed_tasks
    }

    pub fn start_metering(&mut self) {
        let time = self.ctx.time();
        let power = self.power_model.get_power(time, self.cpu_load());
        self.energy_meter.start(time, power);
    }

    pub fn stop_metering(&mut self) {
        self.energy_meter.stop(self.ctx.time());
    }

    /// Energy consumed during the metered interval in joules.
    pub fn energy_consumed(&self) -> f64 {
        self.energy_meter.energy_consumed()
    }
}

impl EventHandler for HostManager {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            AllocationRequest { vm_id } => {
                let delay = self.vm_registry.borrow().get(vm_id).map(|vm| vm.spec.startup_delay);
                if let Ok(delay) = delay {
                    self.ctx.emit_self(VmStarted { vm_id }, delay.max(0.));
                }
            }
            VmStarted { vm_id } => {
                self.vm_registry
                    .borrow_mut()
                    .set_status(vm_id, VmStatus::Running, self.ctx.time());
                log_info!(self.ctx, "vm #{} started", vm_id);
            }
            TaskFinished { task_id, vm_id } => {
                self.on_task_finished(task_id, vm_id);
            }
        })
    }
}
