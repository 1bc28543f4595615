//! Main class of the IaaS model.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use sugars::{rc, refcell};

use twin_core::{log_debug, log_info};
use twin_core::{EventHandler, Id, Simulation, SimulationContext};

use crate::core::config::CloudConfig;
use crate::core::error::CloudError;
use crate::core::events::allocation::AllocationRequest;
use crate::core::host_manager::{ComputeTask, HostManager};
use crate::core::network::Network;
use crate::core::power_model::LinearPowerModel;
use crate::core::vm::{VirtualMachine, VmSpec, VmStatus};
use crate::core::vm_registry::VmRegistry;

/// Owns the simulation together with hosts, VMs and the repository network.
pub struct CloudSimulation {
    sim: Simulation,
    ctx: SimulationContext,
    config: CloudConfig,
    hosts: BTreeMap<u32, Rc<RefCell<HostManager>>>,
    vm_registry: Rc<RefCell<VmRegistry>>,
    network: Rc<RefCell<Network>>,
    next_task_id: u64,
}

impl CloudSimulation {
    pub fn new(mut sim: Simulation, config: CloudConfig) -> Self {
        let ctx = sim.create_context("cloud");
        let network = rc!(refcell!(Network::new(
            config.network_latency,
            config.repository.bandwidth,
            sim.create_context("network"),
        )));
        sim.add_handler("network", network.clone());
        Self {
            sim,
            ctx,
            config,
            hosts: BTreeMap::new(),
            vm_registry: rc!(refcell!(VmRegistry::new())),
            network,
            next_task_id: 0,
        }
    }

    /// Creates new physical host together with its local repository named `<name>-repo`.
    pub fn add_host(&mut self, name: &str) -> Result<u32, CloudError> {
        if self.sim.lookup_id(name).is_some() {
            return Err(CloudError::DuplicateName(name.to_string()));
        }
        let host_config = &self.config.host;
        let host = rc!(refcell!(HostManager::new(
            host_config,
            Box::new(LinearPowerModel::new(host_config.idle_power, host_config.max_power)),
            self.vm_registry.clone(),
            self.sim.create_context(name),
        )));
        let id = self.sim.add_handler(name, host.clone());
        self.hosts.insert(id, host);
        self.network.borrow_mut().add_repository(
            &format!("{}-repo", name),
            self.config.repository.capacity,
            Some(id),
        )?;
        log_debug!(self.ctx, "added host {} with id {}", name, id);
        Ok(id)
    }

    /// Creates a repository that is not attached to any host.
    pub fn add_repository(&mut self, name: &str) -> Result<(), CloudError> {
        self.network
            .borrow_mut()
            .add_repository(name, self.config.repository.capacity, None)
    }

    /// Places the VM on the first host with enough free resources and schedules its start.
    ///
    /// The VM becomes running after `message_delay + spec.startup_delay` seconds.
    pub fn spawn_vm(&mut self, spec: VmSpec) -> Result<u32, CloudError> {
        let host = self
            .hosts
            .values()
            .find(|host| host.borrow().can_allocate(&spec))
            .cloned()
            .ok_or_else(|| CloudError::NoHostAvailable {
                name: spec.name.clone(),
                cpu: spec.cpu_cores,
                memory: spec.memory,
            })?;
        let host_id = host.borrow().id;
        let vm_id = self.vm_registry.borrow_mut().register(spec.clone(), host_id)?;
        host.borrow_mut().allocate(vm_id, &spec);
        log_info!(
            self.ctx,
            "vm {} (#{}) is placed on host {}",
            spec.name,
            vm_id,
            host.borrow().name()
        );
        self.ctx
            .emit(AllocationRequest { vm_id }, host_id, self.config.message_delay);
        Ok(vm_id)
    }

    /// Submits compute task to a running VM, returns the task id.
    ///
    /// `requester` receives [`TaskCompleted`](crate::core::events::compute::TaskCompleted) when the task is done.
    pub fn submit_task(
        &mut self,
        vm_id: u32,
        instructions: u64,
        idle_fraction: f64,
        requester: Id,
    ) -> Result<u64, CloudError> {
        let host_id = self.vm_registry.borrow().get(vm_id)?.host_id;
        let host = self.hosts.get(&host_id).ok_or(CloudError::UnknownVm(vm_id))?;
        let task_id = self.next_task_id;
        host.borrow_mut()
            .submit(ComputeTask::new(task_id, vm_id, instructions, idle_fraction, requester))?;
        self.next_task_id += 1;
        Ok(task_id)
    }

    /// Starts data transfer between repositories, returns the transfer id.
    pub fn transfer(&mut self, src: &str, dst: &str, size: u64, requester: Id) -> Result<u64, CloudError> {
        self.network.borrow_mut().transfer_data(src, dst, size, requester)
    }

    /// Creates a context for a user-defined component.
    pub fn create_context(&mut self, name: &str) -> SimulationContext {
        self.sim.create_context(name)
    }

    /// Registers a user-defined component as an event handler.
    pub fn add_handler(&mut self, name: &str, handler: Rc<RefCell<dyn EventHandler>>) -> Id {
        self.sim.add_handler(name, handler)
    }

    pub fn host(&self, host_id: u32) -> Option<Rc<RefCell<HostManager>>> {
        self.hosts.get(&host_id).cloned()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Rc<RefCell<HostManager>>> {
        self.hosts.values()
    }

    pub fn vm(&self, vm_id: u32) -> Result<VirtualMachine, CloudError> {
        self.vm_registry.borrow().get(vm_id).cloned()
    }

    pub fn vm_status(&self, vm_id: u32) -> Option<VmStatus> {
        self.vm_registry.borrow().status(vm_id)
    }

    pub fn vm_registry(&self) -> Rc<RefCell<VmRegistry>> {
        self.vm_registry.clone()
    }

    pub fn network(&self) -> Rc<RefCell<Network>> {
        self.network.clone()
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    /// Current simulation time in seconds.
    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    /// Advances the clock by exactly `duration` seconds, processing all events due in this interval.
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let target = self.sim.time() + duration;
        self.sim.step_until_time(target)
    }

    /// Advances the clock to `time`, see [`Simulation::step_until_time`].
    pub fn step_until_time(&mut self, time: f64) -> bool {
        self.sim.step_until_time(time)
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn start_energy_metering(&mut self) {
        for host in self.hosts.values() {
            host.borrow_mut().start_metering();
        }
    }

    pub fn stop_energy_metering(&mut self) {
        for host in self.hosts.values() {
            host.borrow_mut().stop_metering();
        }
    }

    /// Total energy consumed by all hosts during the metered interval in joules.
    pub fn energy_consumed(&self) -> f64 {
        self.hosts.values().map(|host| host.borrow().energy_consumed()).sum()
    }
}
