//! Deployment service trait.
//!
//! The deployment service places a [`Descriptor`] onto its sub-targets and
//! reports a per-sub-target [`Summary`].

use async_trait::async_trait;
use thiserror::Error;

use crate::descriptor::Descriptor;
use crate::summary::Summary;

/// Errors returned by a [`DeploymentClient`].
#[derive(Debug, Clone, Error)]
pub enum DeployError {
    /// The service answered with a non-success status. `body` is kept verbatim
    /// so callers can decode structured failure reports from it.
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Client for the external deployment service.
#[async_trait]
pub trait DeploymentClient: Send + Sync {
    /// Deploy the descriptor and report the outcome per sub-target.
    async fn deploy(&self, descriptor: &Descriptor) -> Result<Summary, DeployError>;

    /// Remove everything the descriptor placed.
    async fn remove(&self, descriptor: &Descriptor) -> Result<Summary, DeployError>;
}
