//! The Target reconciliation pass.
//!
//! One pass:
//! 1. Fetches the Target; a missing object means there is nothing to do.
//! 2. Writes `Reconciling` status before any slow downstream call.
//! 3. Either deploys (adding the finalizer first) or, when deletion was
//!    requested, removes the deployment best-effort and releases the finalizer.
//!
//! A pass is safe to repeat at any point: every status write replaces the
//! whole status, and finalizer changes are no-ops when already applied.

use crate::classifier::{FailureReport, classify};
use crate::context::PassContext;
use crate::finalizer::{Cleanup, FailurePolicy};
use crate::projector::{Projection, labels, project};
use crate::{ControllerError, ControllerResult};
use chrono::Utc;
use edgeward_config::ControllerConfig;
use edgeward_core::{
    DeploymentClient, Descriptor, DescriptorBuilder, OPERATION_ID_ANNOTATION, ObjectKey, Summary,
    TARGET_FINALIZER, Target, TargetStore,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Name of the synthetic sub-target reported when no descriptor could be built.
const SELF_TARGET: &str = "self";

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub finalizer: String,
    pub operation_annotation: String,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            finalizer: TARGET_FINALIZER.to_string(),
            operation_annotation: OPERATION_ID_ANNOTATION.to_string(),
        }
    }
}

impl From<&ControllerConfig> for ReconcilerSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            finalizer: config.finalizer.clone(),
            operation_annotation: config.operation_annotation.clone(),
        }
    }
}

/// Result of a pass that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The Target no longer exists.
    Gone,
    /// The deployment service accepted the descriptor.
    Deployed { summary: Summary },
    /// No components were assigned, so the service was not called.
    NothingToDeploy,
    /// Deletion was requested and the finalizer has been released.
    Finalized { cleanup: Cleanup },
    /// Deletion was requested but the finalizer is not ours to release.
    Untracked,
}

impl PassOutcome {
    pub fn policy(&self) -> Option<FailurePolicy> {
        match self {
            PassOutcome::Deployed { .. } | PassOutcome::NothingToDeploy => {
                Some(FailurePolicy::RetryOnFailure)
            }
            PassOutcome::Finalized { .. } => Some(FailurePolicy::BestEffort),
            PassOutcome::Gone | PassOutcome::Untracked => None,
        }
    }

    /// Whether the object is leaving the store.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PassOutcome::Gone | PassOutcome::Finalized { .. })
    }
}

/// Reconciles one Target at a time. Holds no per-Target state, so a single
/// instance serves every key concurrently.
pub struct Reconciler {
    store: Arc<dyn TargetStore>,
    deployer: Arc<dyn DeploymentClient>,
    builder: Arc<dyn DescriptorBuilder>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn TargetStore>,
        deployer: Arc<dyn DeploymentClient>,
        builder: Arc<dyn DescriptorBuilder>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            deployer,
            builder,
            settings,
        }
    }

    /// Run one reconciliation pass for `key`.
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        ctx: &PassContext,
    ) -> ControllerResult<PassOutcome> {
        info!(key = %key, "Reconciling Target");

        let mut target = match ctx.call("fetch target", self.store.get(key)).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                debug!(key = %key, "Target not found, nothing to do");
                return Ok(PassOutcome::Gone);
            }
            Err(err) if err.is_not_found() => return Ok(PassOutcome::Gone),
            Err(err) => {
                error!(key = %key, error = %err, "Unable to fetch Target");
                return Err(err);
            }
        };

        let operation_id = target.operation_id(&self.settings.operation_annotation);

        let marked = self
            .write_status(&mut target, Projection::Reconciling, &operation_id, ctx)
            .await;
        if let Err(err) = marked {
            if !err.is_not_found() {
                error!(key = %key, error = %err, "Unable to mark Target in progress");
            }
            return gone_if_vanished(key, Err(err));
        }

        let result = match FailurePolicy::for_target(&target) {
            FailurePolicy::RetryOnFailure => self.apply(key, target, &operation_id, ctx).await,
            FailurePolicy::BestEffort => self.finalize(key, target, ctx).await,
        };
        gone_if_vanished(key, result)
    }

    /// Live path: make sure the finalizer is in place, then deploy.
    async fn apply(
        &self,
        key: &ObjectKey,
        mut target: Target,
        operation_id: &str,
        ctx: &PassContext,
    ) -> ControllerResult<PassOutcome> {
        if target.add_finalizer(&self.settings.finalizer) {
            target = ctx.call("add finalizer", self.store.update(&target)).await?;
            debug!(key = %key, finalizer = %self.settings.finalizer, "Added finalizer");
        }

        let descriptor = match self.builder.build(&target) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                error!(key = %key, error = %err, "Failed to build deployment descriptor");
                let summary = Summary::single_failure(SELF_TARGET, err.to_string());
                let err = ControllerError::from(err);
                let projection = Projection::Failed {
                    label: labels::DESCRIPTOR_FAILED,
                    summary,
                    error: classify(&err),
                };
                self.write_status(&mut target, projection, operation_id, ctx)
                    .await?;
                return Err(err);
            }
        };

        if descriptor.assignment_count() == 0 {
            info!(key = %key, "No components assigned, skipping deployment");
            let projection = Projection::Succeeded {
                summary: Summary::default(),
            };
            self.write_status(&mut target, projection, operation_id, ctx)
                .await?;
            return Ok(PassOutcome::NothingToDeploy);
        }

        let summary = match self.deploy(key, &descriptor, ctx).await {
            Ok(summary) => summary,
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                let report = FailureReport::decode(&err);
                let projection = Projection::Failed {
                    label: labels::FAILED,
                    summary: report.summary(),
                    error: report.to_error_detail(),
                };
                self.write_status(&mut target, projection, operation_id, ctx)
                    .await?;
                return Err(err);
            }
        };

        // Persist the object again so a finalizer added earlier in this pass is
        // guaranteed to be stored before success is reported.
        match ctx.call("persist target", self.store.update(&target)).await {
            Ok(updated) => target = updated,
            Err(err) if err.is_cancelled() || err.is_not_found() => return Err(err),
            Err(err) => {
                error!(key = %key, error = %err, "Failed to persist Target after deployment");
                let projection = Projection::Failed {
                    label: labels::PERSIST_FAILED,
                    summary,
                    error: classify(&err),
                };
                self.write_status(&mut target, projection, operation_id, ctx)
                    .await?;
                return Err(err);
            }
        }

        let projection = Projection::Succeeded {
            summary: summary.clone(),
        };
        self.write_status(&mut target, projection, operation_id, ctx)
            .await?;

        info!(
            key = %key,
            targets = summary.target_count,
            deployed = summary.success_count,
            "Target deployed"
        );
        Ok(PassOutcome::Deployed { summary })
    }

    async fn deploy(
        &self,
        key: &ObjectKey,
        descriptor: &Descriptor,
        ctx: &PassContext,
    ) -> ControllerResult<Summary> {
        debug!(
            key = %key,
            solution = %descriptor.solution_name,
            assignments = descriptor.assignment_count(),
            "Deploying Target"
        );
        let result = ctx.call("deploy", self.deployer.deploy(descriptor)).await;
        if let Err(err) = &result {
            error!(key = %key, error = %err, "Failed to deploy Target");
        }
        result
    }

    /// Deletion path: clean up downstream without letting failures block
    /// deletion, then release the finalizer.
    async fn finalize(
        &self,
        key: &ObjectKey,
        mut target: Target,
        ctx: &PassContext,
    ) -> ControllerResult<PassOutcome> {
        if !target.has_finalizer(&self.settings.finalizer) {
            debug!(key = %key, "Deletion requested, finalizer not present");
            return Ok(PassOutcome::Untracked);
        }

        let policy = FailurePolicy::BestEffort;
        let cleanup = match self.builder.build(&target) {
            Ok(descriptor) => match ctx.call("remove", self.deployer.remove(&descriptor)).await {
                Ok(summary) => Cleanup::Removed { summary },
                Err(err) => {
                    let reason = err.to_string();
                    policy.absorb(key, "remove deployment", err)?;
                    Cleanup::RemoveFailed { reason }
                }
            },
            Err(err) => {
                let reason = err.to_string();
                policy.absorb(key, "build descriptor", err.into())?;
                Cleanup::DescriptorFailed { reason }
            }
        };

        target.remove_finalizer(&self.settings.finalizer);
        match ctx.call("remove finalizer", self.store.update(&target)).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                error!(key = %key, error = %err, "Failed to release finalizer");
                return Err(err);
            }
        }

        info!(key = %key, "Released finalizer");
        Ok(PassOutcome::Finalized { cleanup })
    }

    /// Replace the status and persist it, keeping the stored copy.
    async fn write_status(
        &self,
        target: &mut Target,
        projection: Projection,
        operation_id: &str,
        ctx: &PassContext,
    ) -> ControllerResult<()> {
        target.status = Some(project(projection, operation_id.to_string(), Utc::now()));
        let stored = ctx
            .call("update status", self.store.update_status(target))
            .await?;
        *target = stored;
        Ok(())
    }
}

/// A store write that finds no object means the Target was deleted while the
/// pass ran. That ends the pass like a failed fetch does.
fn gone_if_vanished(
    key: &ObjectKey,
    result: ControllerResult<PassOutcome>,
) -> ControllerResult<PassOutcome> {
    match result {
        Err(err) if err.is_not_found() => {
            debug!(key = %key, error = %err, "Target vanished during the pass");
            Ok(PassOutcome::Gone)
        }
        other => other,
    }
}
