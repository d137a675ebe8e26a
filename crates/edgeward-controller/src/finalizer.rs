//! Failure policies and deletion cleanup results.

use crate::{ControllerError, ControllerResult};
use edgeward_core::{ObjectKey, Summary, Target};

/// How a pass treats a failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the failure in status and return it so the pass is retried.
    RetryOnFailure,
    /// Log the failure and carry on. Used while releasing the finalizer so a
    /// broken or vanished deployment never blocks deletion.
    BestEffort,
}

impl FailurePolicy {
    pub fn for_target(target: &Target) -> Self {
        if target.deletion_requested() {
            FailurePolicy::BestEffort
        } else {
            FailurePolicy::RetryOnFailure
        }
    }

    /// Route a failed step. Cancellation always propagates.
    pub fn absorb(self, key: &ObjectKey, step: &str, err: ControllerError) -> ControllerResult<()> {
        match self {
            FailurePolicy::BestEffort if !err.is_cancelled() => {
                tracing::warn!(key = %key, step, error = %err, "Ignoring failed cleanup step");
                Ok(())
            }
            _ => Err(err),
        }
    }
}

/// What happened to the downstream deployment while finalizing.
#[derive(Debug, Clone, PartialEq)]
pub enum Cleanup {
    Removed { summary: Summary },
    DescriptorFailed { reason: String },
    RemoveFailed { reason: String },
}
