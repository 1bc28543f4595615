//! Run-level errors.

use thiserror::Error;

use twin_cloud::CloudError;

/// The cause of a failed run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunFailure {
    #[error("backup VM {name} could not be provisioned: {reason}")]
    Provisioning { name: String, reason: String },
    #[error("data transfer {transfer_id} failed: {reason}")]
    TransferFailed { transfer_id: u64, reason: String },
    #[error(transparent)]
    Engine(#[from] CloudError),
}

/// Error returned by a failed strategy run.
///
/// The message names the strategy, the cause keeps the underlying failure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}: {cause}")]
pub struct SimulationError {
    message: String,
    #[source]
    cause: RunFailure,
}

impl SimulationError {
    pub fn new(message: impl Into<String>, cause: RunFailure) -> Self {
        Self {
            message: message.into(),
            cause,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> &RunFailure {
        &self.cause
    }
}
