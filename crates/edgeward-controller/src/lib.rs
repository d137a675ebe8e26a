//! Target reconciliation controller.
//!
//! Drives `Target` resources toward a deployed state through the external
//! deployment service and reports every outcome through the resource's status:
//!
//! - [`classifier`]: turns deployment errors into typed [`ErrorDetail`]s
//! - [`projector`]: renders pass outcomes into `TargetStatus`
//! - [`reconciler`]: the finalizer-gated control loop for one Target
//! - [`runner`]: wiring into `kube::runtime::Controller`
//!
//! [`ErrorDetail`]: edgeward_core::ErrorDetail

pub mod backoff;
pub mod classifier;
pub mod context;
pub mod error;
pub mod finalizer;
pub mod projector;
pub mod reconciler;
pub mod runner;
pub mod store;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use context::PassContext;
pub use error::{ControllerError, ControllerResult};
pub use finalizer::{Cleanup, FailurePolicy};
pub use reconciler::{PassOutcome, Reconciler, ReconcilerSettings};
