//! Simulation strategies: what workload a run executes.

use log::debug;

use crate::aggregation::{idle_fraction, instructions_for_load, AggregatedForecast};
use crate::config::TwinConfig;
use crate::dispatcher::WorkUnit;
use crate::error::RunFailure;
use crate::lifecycle::RunContext;
use crate::profile::RunRequest;
use crate::scaling::ScalingManager;

pub trait SimulationStrategy {
    fn name(&self) -> &str;

    /// Number of hosts to build for the run.
    fn physical_machines(&self, config: &TwinConfig) -> u32;

    /// Dispatches the workload of the run. The clock may advance while it does.
    fn run_workload(&mut self, run: &mut RunContext, request: &RunRequest) -> Result<(), RunFailure>;
}

/// Every VM runs at its last observed usage for the whole horizon.
pub struct BaselineStrategy;

impl SimulationStrategy for BaselineStrategy {
    fn name(&self) -> &str {
        "Baseline"
    }

    fn physical_machines(&self, config: &TwinConfig) -> u32 {
        config.default_physical_machines
    }

    fn run_workload(&mut self, run: &mut RunContext, request: &RunRequest) -> Result<(), RunFailure> {
        let primaries = run.primaries().to_vec();
        for primary in &primaries {
            let usage = primary.profile.usage;
            let instructions = instructions_for_load(usage, primary.profile.max_instructions_per_second());
            debug!(
                "Baseline of {}: {} instructions per minute at {}%",
                primary.profile.name, instructions, usage
            );
            let handle = primary.handle();
            for minute in 0..request.prediction_length as usize {
                run.dispatch(
                    &handle,
                    WorkUnit {
                        minute,
                        instructions,
                        idle_fraction: idle_fraction(usage),
                        task_credit: instructions,
                    },
                )?;
            }
        }
        Ok(())
    }
}

/// Every VM runs its forecast load minute by minute.
pub struct PredictionWithoutScalingStrategy {
    data: AggregatedForecast,
}

impl PredictionWithoutScalingStrategy {
    pub fn new(data: AggregatedForecast) -> Self {
        Self { data }
    }
}

impl SimulationStrategy for PredictionWithoutScalingStrategy {
    fn name(&self) -> &str {
        "Prediction without scaling"
    }

    fn physical_machines(&self, config: &TwinConfig) -> u32 {
        config.default_physical_machines
    }

    fn run_workload(&mut self, run: &mut RunContext, _request: &RunRequest) -> Result<(), RunFailure> {
        let primaries = run.primaries().to_vec();
        for primary in &primaries {
            let series = match self.data.get(&primary.profile.name) {
                Some(series) => series,
                None => continue,
            };
            let handle = primary.handle();
            for minute in 0..series.len() {
                run.dispatch(
                    &handle,
                    WorkUnit {
                        minute,
                        instructions: series.instructions[minute],
                        idle_fraction: idle_fraction(series.avg_load[minute]),
                        task_credit: series.instructions[minute],
                    },
                )?;
            }
        }
        Ok(())
    }
}

/// Forecast load with backup VMs for overloaded primaries.
pub struct PredictionWithScalingStrategy {
    data: AggregatedForecast,
}

impl PredictionWithScalingStrategy {
    pub fn new(data: AggregatedForecast) -> Self {
        Self { data }
    }
}

impl SimulationStrategy for PredictionWithScalingStrategy {
    fn name(&self) -> &str {
        "Prediction with scaling"
    }

    fn physical_machines(&self, config: &TwinConfig) -> u32 {
        config.scaling_physical_machines
    }

    fn run_workload(&mut self, run: &mut RunContext, request: &RunRequest) -> Result<(), RunFailure> {
        let last_backup_minute = ScalingManager::new(request.threshold).execute(run, &self.data)?;
        debug!("Scaling done, last backup started at minute {}", last_backup_minute);
        Ok(())
    }
}
