//! Controller error types.

use edgeward_core::{DeployError, DescriptorError, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Why a reconciliation pass failed. Every variant is retried by the runner.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("resource store: {0}")]
    Store(#[from] StoreError),

    #[error("deployment service: {0}")]
    Deploy(#[from] DeployError),

    #[error("deployment descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },
}

impl ControllerError {
    /// The object disappeared from the store while the pass was running.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::Store(e) if e.is_not_found())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ControllerError::Cancelled { .. })
    }
}

pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
