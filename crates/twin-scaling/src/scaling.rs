//! Threshold-driven backup provisioning.
//!
//! Every VM starts in the normal state, where each forecast minute is dispatched to the VM as a
//! whole. The first minute whose normalized load reaches the threshold creates a backup VM; from
//! then on every minute of that VM is split in halves between the VM and its backup.

use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;

use crate::aggregation::{idle_fraction, AggregatedForecast, MinuteSeries};
use crate::dispatcher::{VmHandle, WorkUnit};
use crate::error::RunFailure;
use crate::lifecycle::{PrimaryVm, RunContext};

/// Share of the work (and load) moved to the backup VM.
pub const LOAD_SPLIT_RATIO: f64 = 0.5;

/// Backup VM created for an overloaded primary.
#[derive(Clone, Debug, Serialize)]
pub struct BackupVm {
    pub handle: VmHandle,
    /// Minute (counted from the run start) when the backup became available.
    pub created_at_minute: u32,
}

/// Backups keyed by the name of their primary VM, at most one per primary.
#[derive(Clone, Debug, Default)]
pub struct BackupRegistry {
    backups: IndexMap<String, BackupVm>,
}

impl BackupRegistry {
    pub fn get(&self, primary: &str) -> Option<&BackupVm> {
        self.backups.get(primary)
    }

    pub fn contains(&self, primary: &str) -> bool {
        self.backups.contains_key(primary)
    }

    pub fn insert(&mut self, primary: &str, backup: BackupVm) {
        self.backups.entry(primary.to_string()).or_insert(backup);
    }

    pub fn len(&self) -> usize {
        self.backups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BackupVm)> {
        self.backups.iter()
    }

    /// Latest creation minute, 0 if there are no backups.
    pub fn max_creation_minute(&self) -> u32 {
        self.backups.values().map(|b| b.created_at_minute).max().unwrap_or(0)
    }
}

pub struct ScalingManager {
    threshold: f64,
    registry: BackupRegistry,
}

impl ScalingManager {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            registry: BackupRegistry::default(),
        }
    }

    pub fn registry(&self) -> &BackupRegistry {
        &self.registry
    }

    /// Dispatches the forecast of every primary VM, creating backups where the load reaches the threshold.
    ///
    /// Returns the latest backup creation minute, 0 if no backup was created.
    pub fn execute(&mut self, run: &mut RunContext, data: &AggregatedForecast) -> Result<u32, RunFailure> {
        let primaries = run.primaries().to_vec();
        for primary in &primaries {
            match data.get(&primary.profile.name) {
                Some(series) => self.process_vm(run, primary, series)?,
                None => debug!("No forecast for {}", primary.profile.name),
            }
        }
        Ok(self.registry.max_creation_minute())
    }

    fn process_vm(
        &mut self,
        run: &mut RunContext,
        primary: &PrimaryVm,
        series: &MinuteSeries,
    ) -> Result<(), RunFailure> {
        let name = &primary.profile.name;
        let handle = primary.handle();
        for minute in 0..series.len() {
            let existing = self.registry.get(name).map(|backup| backup.handle.clone());
            let backup = match existing {
                Some(backup) => Some(backup),
                None if series.normalized_load(minute) >= self.threshold => {
                    Some(self.create_backup(run, primary, minute)?)
                }
                None => None,
            };
            match backup {
                Some(backup) => split_minute(run, &handle, &backup, series, minute)?,
                None => {
                    let avg_load = series.avg_load[minute];
                    let instructions = series.instructions[minute];
                    run.dispatch(
                        &handle,
                        WorkUnit {
                            minute,
                            instructions,
                            idle_fraction: idle_fraction(avg_load),
                            task_credit: instructions,
                        },
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Provisions the backup and blocks until it runs; the clock moves to the start of the next minute first.
    fn create_backup(
        &mut self,
        run: &mut RunContext,
        primary: &PrimaryVm,
        minute: usize,
    ) -> Result<VmHandle, RunFailure> {
        let handle = run.provision_backup(primary)?;
        let created_at_minute = minute as u32 + 1;
        run.advance_to_minute(created_at_minute);
        run.wait_until_running(&handle)?;
        info!(
            "Load of {} reached {:.3} in minute {}, backup {} is running at {:.3}",
            primary.profile.name,
            self.threshold,
            minute,
            handle.name,
            run.cloud().current_time()
        );
        self.registry.insert(
            &primary.profile.name,
            BackupVm {
                handle: handle.clone(),
                created_at_minute,
            },
        );
        Ok(handle)
    }
}

/// Dispatches half of the minute to the primary and half to the backup.
///
/// Both halves carry `round(instructions * 0.5)` instructions at `round(load * 0.5)` percent load.
/// The halved load is rounded on the percent scale before it is turned into an idle fraction,
/// so 67% splits into two 34% halves and the fraction stays within [0, 1].
/// Task credits are `instructions - half` and `half`, so the counter grows by the unsplit amount.
fn split_minute(
    run: &mut RunContext,
    primary: &VmHandle,
    backup: &VmHandle,
    series: &MinuteSeries,
    minute: usize,
) -> Result<(), RunFailure> {
    let instructions = series.instructions[minute];
    let half_instructions = (instructions as f64 * LOAD_SPLIT_RATIO).round() as u64;
    let half_load = (series.avg_load[minute] * LOAD_SPLIT_RATIO).round();
    let idle = idle_fraction(half_load);
    run.dispatch(
        primary,
        WorkUnit {
            minute,
            instructions: half_instructions,
            idle_fraction: idle,
            task_credit: instructions.saturating_sub(half_instructions),
        },
    )?;
    run.dispatch(
        backup,
        WorkUnit {
            minute,
            instructions: half_instructions,
            idle_fraction: idle,
            task_credit: half_instructions.min(instructions),
        },
    )?;
    Ok(())
}
