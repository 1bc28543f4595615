//! Storage repositories and data transfers between them.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use twin_core::{cast, log_debug, log_warn};
use twin_core::{Event, EventHandler, Id, SimulationContext};

use crate::core::error::CloudError;
use crate::core::events::transfer::{DataTransfer, DataTransferCompleted, DataTransferFailed, DataTransferFinished};

/// A storage repository, either attached to a host or standing alone in the cloud.
#[derive(Clone, Debug, Serialize)]
pub struct Repository {
    pub name: String,
    /// Capacity in bytes.
    pub capacity: u64,
    /// Stored data in bytes.
    pub used: u64,
    pub host_id: Option<u32>,
}

impl Repository {
    pub fn free_space(&self) -> u64 {
        self.capacity - self.used
    }
}

/// Moves data between repositories.
///
/// All repositories are connected with the same latency and bandwidth, so a transfer of `size` bytes
/// takes `latency + size / bandwidth` seconds.
pub struct Network {
    repositories: BTreeMap<String, Repository>,
    host_repositories: BTreeMap<u32, String>,
    latency: f64,
    bandwidth: f64,
    next_transfer_id: u64,
    transfers_in_flight: HashMap<u64, u64>,
    ctx: SimulationContext,
}

impl Network {
    pub fn new(latency: f64, bandwidth: f64, ctx: SimulationContext) -> Self {
        Self {
            repositories: BTreeMap::new(),
            host_repositories: BTreeMap::new(),
            latency,
            bandwidth,
            next_transfer_id: 0,
            transfers_in_flight: HashMap::new(),
            ctx,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn add_repository(&mut self, name: &str, capacity: u64, host_id: Option<u32>) -> Result<(), CloudError> {
        if self.repositories.contains_key(name) {
            return Err(CloudError::DuplicateName(name.to_string()));
        }
        self.repositories.insert(
            name.to_string(),
            Repository {
                name: name.to_string(),
                capacity,
                used: 0,
                host_id,
            },
        );
        if let Some(host_id) = host_id {
            self.host_repositories.insert(host_id, name.to_string());
        }
        log_debug!(self.ctx, "added repository {} with capacity {}", name, capacity);
        Ok(())
    }

    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repositories.get(name)
    }

    /// Returns the name of the repository attached to the host.
    pub fn host_repository(&self, host_id: u32) -> Option<&str> {
        self.host_repositories.get(&host_id).map(|s| s.as_str())
    }

    /// Chooses where to send data from `src`: the first repository of another host,
    /// or a standalone cloud repository if there are no other hosts.
    pub fn pick_target(&self, src: &str) -> Result<String, CloudError> {
        self.host_repositories
            .values()
            .find(|name| name.as_str() != src)
            .or_else(|| {
                self.repositories
                    .values()
                    .find(|repo| repo.host_id.is_none() && repo.name != src)
                    .map(|repo| &repo.name)
            })
            .cloned()
            .ok_or_else(|| CloudError::NoTransferTarget(src.to_string()))
    }

    /// Transfer duration in seconds for `size` bytes.
    pub fn transfer_time(&self, size: u64) -> f64 {
        self.latency + size as f64 / self.bandwidth
    }

    /// Starts data transfer, `notification_dest` receives the completion (or failure) event.
    pub fn transfer_data(&mut self, src: &str, dst: &str, size: u64, notification_dest: Id) -> Result<u64, CloudError> {
        for name in [src, dst] {
            if !self.repositories.contains_key(name) {
                return Err(CloudError::UnknownRepository(name.to_string()));
            }
        }
        let id = self.next_transfer_id;
        self.next_transfer_id += 1;
        let transfer = DataTransfer {
            id,
            src: src.to_string(),
            dst: dst.to_string(),
            size,
            notification_dest,
        };
        log_debug!(self.ctx, "new data transfer {} from {} to {} of size {}", id, src, dst, size);
        self.transfers_in_flight.insert(id, size);
        self.ctx.emit_self(DataTransferFinished { transfer }, self.transfer_time(size));
        Ok(id)
    }

    pub fn transfers_in_flight(&self) -> usize {
        self.transfers_in_flight.len()
    }

    fn on_transfer_finished(&mut self, transfer: DataTransfer) {
        self.transfers_in_flight.remove(&transfer.id);
        let dest = transfer.notification_dest;
        let repo = match self.repositories.get_mut(&transfer.dst) {
            Some(repo) => repo,
            None => return,
        };
        if repo.free_space() < transfer.size {
            let reason = format!(
                "not enough space in {}: {} bytes free, {} requested",
                repo.name,
                repo.free_space(),
                transfer.size
            );
            log_warn!(self.ctx, "data transfer {} failed: {}", transfer.id, reason);
            self.ctx.emit_now(DataTransferFailed { transfer, reason }, dest);
        } else {
            repo.used += transfer.size;
            log_debug!(
                self.ctx,
                "completed data transfer {} from {} to {} of size {}",
                transfer.id,
                transfer.src,
                transfer.dst,
                transfer.size
            );
            self.ctx.emit_now(DataTransferCompleted { transfer }, dest);
        }
    }
}

impl EventHandler for Network {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            DataTransferFinished { transfer } => {
                self.on_transfer_finished(transfer);
            }
        })
    }
}
