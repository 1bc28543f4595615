//! Errors reported by the IaaS model.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloudError {
    #[error("unknown VM {0}")]
    UnknownVm(u32),
    #[error("VM {vm_id} is not running (status: {status})")]
    VmNotRunning { vm_id: u32, status: String },
    #[error("no host can fit VM {name} ({cpu} cores, {memory} bytes of memory)")]
    NoHostAvailable { name: String, cpu: u32, memory: u64 },
    #[error("unknown repository {0}")]
    UnknownRepository(String),
    #[error("no transfer target for repository {0}")]
    NoTransferTarget(String),
    #[error("duplicate name {0}")]
    DuplicateName(String),
}
