//! Setup, execution and teardown of a single strategy run.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use log::{debug, info, warn};
use sugars::{rc, refcell};

use twin_cloud::core::config::CloudConfig;
use twin_cloud::core::vm::VmStatus;
use twin_cloud::CloudSimulation;
use twin_core::Simulation;

use crate::config::TwinConfig;
use crate::dispatcher::{TaskDispatcher, VmHandle, VmRole, WorkUnit};
use crate::error::{RunFailure, SimulationError};
use crate::metrics::MetricsAccumulator;
use crate::profile::{RunRequest, VmProfile};
use crate::report::{CostModel, RunReport};
use crate::strategy::SimulationStrategy;

pub const SECONDS_PER_MINUTE: f64 = 60.;

/// Slack in seconds added to the horizon end to absorb rounding of task durations.
const HORIZON_TOLERANCE: f64 = 1e-6;

/// Name of the repository that is not attached to any host.
pub const CLOUD_REPOSITORY: &str = "cloud-repo";

/// Primary VM of the fleet.
#[derive(Clone, Debug)]
pub struct PrimaryVm {
    pub profile: VmProfile,
    pub vm_id: u32,
}

impl PrimaryVm {
    pub fn handle(&self) -> VmHandle {
        VmHandle {
            name: self.profile.name.clone(),
            vm_id: self.vm_id,
            role: VmRole::Primary,
            data_since_last_save: self.profile.data_since_last_save,
        }
    }
}

/// State of one run: infrastructure, dispatcher and counters.
///
/// Owns the simulation clock, so independent runs never share time or state.
pub struct RunContext {
    cloud: CloudSimulation,
    dispatcher: Rc<RefCell<TaskDispatcher>>,
    metrics: Rc<RefCell<MetricsAccumulator>>,
    primaries: Vec<PrimaryVm>,
    backed_up: BTreeSet<String>,
    run_start: f64,
}

impl RunContext {
    /// Creates hosts `pm-1..pm-N` with their repositories, the cloud repository and one VM per profile.
    pub fn initialize(
        cloud_config: &CloudConfig,
        profiles: &[VmProfile],
        physical_machines: u32,
    ) -> Result<Self, RunFailure> {
        let mut cloud = CloudSimulation::new(Simulation::new(), cloud_config.clone());
        for i in 1..=physical_machines {
            cloud.add_host(&format!("pm-{}", i))?;
        }
        cloud.add_repository(CLOUD_REPOSITORY)?;

        let metrics = rc!(refcell!(MetricsAccumulator::new()));
        let dispatcher = rc!(refcell!(TaskDispatcher::new(
            metrics.clone(),
            cloud.network(),
            cloud.create_context("dispatcher"),
        )));
        cloud.add_handler("dispatcher", dispatcher.clone());

        let mut primaries = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let vm_id = cloud.spawn_vm(profile.vm_spec())?;
            primaries.push(PrimaryVm {
                profile: profile.clone(),
                vm_id,
            });
        }
        metrics.borrow_mut().add_vms(primaries.len() as u32);
        debug!(
            "Initialized run with {} hosts and {} VMs",
            physical_machines,
            primaries.len()
        );

        Ok(Self {
            cloud,
            dispatcher,
            metrics,
            primaries,
            backed_up: BTreeSet::new(),
            run_start: 0.,
        })
    }

    /// Lets the initial VMs start, then records the run start and starts energy metering.
    pub fn start(&mut self) {
        self.cloud.step_until_no_events();
        self.run_start = self.cloud.current_time();
        self.cloud.start_energy_metering();
        info!("Run started at {:.3}", self.run_start);
    }

    pub fn cloud(&self) -> &CloudSimulation {
        &self.cloud
    }

    pub fn cloud_mut(&mut self) -> &mut CloudSimulation {
        &mut self.cloud
    }

    pub fn dispatcher(&self) -> Rc<RefCell<TaskDispatcher>> {
        self.dispatcher.clone()
    }

    pub fn metrics(&self) -> MetricsAccumulator {
        self.metrics.borrow().clone()
    }

    pub fn primaries(&self) -> &[PrimaryVm] {
        &self.primaries
    }

    pub fn run_start(&self) -> f64 {
        self.run_start
    }

    pub fn dispatch(&mut self, vm: &VmHandle, unit: WorkUnit) -> Result<u64, RunFailure> {
        Ok(self.dispatcher.borrow_mut().dispatch(&mut self.cloud, vm, unit)?)
    }

    /// Spawns the backup of a primary VM and counts it, the backup is not running yet.
    pub fn provision_backup(&mut self, primary: &PrimaryVm) -> Result<VmHandle, RunFailure> {
        let profile = primary.profile.backup();
        let vm_id = self
            .cloud
            .spawn_vm(profile.vm_spec())
            .map_err(|err| RunFailure::Provisioning {
                name: profile.name.clone(),
                reason: err.to_string(),
            })?;
        self.metrics.borrow_mut().add_vms(1);
        self.backed_up.insert(primary.profile.name.clone());
        Ok(VmHandle {
            name: profile.name,
            vm_id,
            role: VmRole::Backup,
            data_since_last_save: profile.data_since_last_save,
        })
    }

    /// Moves the clock to `minute` minutes after the run start, never backwards.
    pub fn advance_to_minute(&mut self, minute: u32) {
        let target = self.run_start + minute as f64 * SECONDS_PER_MINUTE;
        let target = target.max(self.cloud.current_time());
        self.cloud.step_until_time(target);
    }

    /// Processes events until the VM is running.
    pub fn wait_until_running(&mut self, vm: &VmHandle) -> Result<(), RunFailure> {
        while self.cloud.vm_status(vm.vm_id) != Some(VmStatus::Running) {
            if !self.cloud.step() {
                return Err(RunFailure::Provisioning {
                    name: vm.name.clone(),
                    reason: "VM never reached running state".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Advances the clock to the end of the horizon, `run_start + prediction_length` minutes.
    ///
    /// The target is absolute, so time spent waiting for backups is not added on top of it.
    /// The clock never moves backwards.
    pub fn drain(&mut self, prediction_length: u32) {
        let horizon_end = self.run_start + prediction_length as f64 * SECONDS_PER_MINUTE;
        let target = horizon_end.max(self.cloud.current_time());
        // units finishing exactly at the horizon end count as completed
        self.cloud.step_until_time(target + HORIZON_TOLERANCE);
    }

    /// Returns the first fault recorded by the dispatcher.
    pub fn check_faults(&self) -> Result<(), RunFailure> {
        match self.dispatcher.borrow().faults().first() {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    /// Stops metering and builds the report. Consumes the run, dropping all of its state.
    pub fn finalize(mut self, cost_model: &CostModel) -> RunReport {
        let stop_time = self.cloud.current_time();
        self.cloud.stop_energy_metering();
        self.metrics.borrow_mut().add_energy(self.cloud.energy_consumed());

        let pending = self.dispatcher.borrow().pending_units();
        if pending > 0 {
            warn!("{} dispatched units did not complete within the horizon", pending);
        }

        let runtime_ms = ((stop_time - self.run_start) * 1000.).round().max(0.) as u64;
        let profiles: Vec<&VmProfile> = self.primaries.iter().map(|vm| &vm.profile).collect();
        let cost = cost_model.total_cost(&profiles, &self.backed_up, runtime_ms as f64 / 3_600_000.);
        let report = RunReport::new(runtime_ms, cost, &self.metrics.borrow());
        info!("Run finished at {:.3}: {:?}", stop_time, report);
        report
    }
}

/// Executes strategies, each on freshly built infrastructure.
pub struct SimulationLifecycle<'a> {
    config: &'a TwinConfig,
    profiles: &'a [VmProfile],
}

impl<'a> SimulationLifecycle<'a> {
    pub fn new(config: &'a TwinConfig, profiles: &'a [VmProfile]) -> Self {
        Self { config, profiles }
    }

    /// Runs the strategy over the request horizon.
    ///
    /// Any failure aborts the run, the error names the strategy.
    pub fn execute(
        &self,
        strategy: &mut dyn SimulationStrategy,
        request: &RunRequest,
    ) -> Result<RunReport, SimulationError> {
        info!("Starting {} simulation", strategy.name());
        self.run(strategy, request).map_err(|cause| {
            let err = SimulationError::new(format!("{} simulation failed", strategy.name()), cause);
            warn!("{}", err);
            err
        })
    }

    fn run(&self, strategy: &mut dyn SimulationStrategy, request: &RunRequest) -> Result<RunReport, RunFailure> {
        let mut run = RunContext::initialize(
            &self.config.cloud,
            self.profiles,
            strategy.physical_machines(self.config),
        )?;
        run.start();
        strategy.run_workload(&mut run, request)?;
        run.drain(request.prediction_length);
        run.check_faults()?;
        Ok(run.finalize(&CostModel::from_config(self.config)))
    }
}
