//! Wiring of the [`Reconciler`] into `kube::runtime::Controller`.
//!
//! The runtime serializes passes per object and bounds overall concurrency.
//! This module adds event filtering and the per-key retry schedule on top.

use crate::backoff::Backoff;
use crate::context::PassContext;
use crate::reconciler::{Reconciler, ReconcilerSettings};
use crate::store::KubeTargetStore;
use crate::trigger::{Fingerprint, TriggerFilter};
use crate::{ControllerError, ControllerResult};
use edgeward_client::HttpDeploymentClient;
use edgeward_config::ControllerConfig;
use edgeward_core::{ObjectKey, Target, TargetDescriptorBuilder};
use futures::StreamExt;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::watcher;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shared state handed to every pass.
pub struct ControllerContext {
    reconciler: Reconciler,
    triggers: TriggerFilter,
    backoff: Backoff,
    pass: PassContext,
}

impl ControllerContext {
    pub fn new(
        reconciler: Reconciler,
        config: &ControllerConfig,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            reconciler,
            triggers: TriggerFilter::new(),
            backoff: Backoff::new(config.backoff),
            pass: PassContext::new(cancel, config.call_timeout),
        }
    }
}

/// Controller entry point for one Target event.
pub async fn reconcile(target: Arc<Target>, ctx: Arc<ControllerContext>) -> ControllerResult<Action> {
    let key = ObjectKey::of(target.as_ref());
    let fingerprint = Fingerprint::of(&target);

    if !ctx.triggers.should_reconcile(&key, &fingerprint) {
        debug!(key = %key, "No relevant change since last pass");
        return Ok(Action::await_change());
    }
    if let Some(wait) = ctx.backoff.hold(&key, &fingerprint) {
        debug!(key = %key, retry_in = ?wait, "Unchanged Target is backing off");
        return Ok(Action::requeue(wait));
    }

    let outcome = ctx.reconciler.reconcile(&key, &ctx.pass).await?;
    ctx.backoff.reset(&key);
    if outcome.is_terminal() {
        ctx.triggers.forget(&key);
    } else {
        ctx.triggers.record(&key, fingerprint);
    }
    debug!(key = %key, outcome = ?outcome, "Pass finished");
    Ok(Action::await_change())
}

/// Schedules the retry of a failed pass.
pub fn error_policy(target: Arc<Target>, err: &ControllerError, ctx: Arc<ControllerContext>) -> Action {
    let key = ObjectKey::of(target.as_ref());
    if err.is_cancelled() {
        // Retried, but not counted against the Target.
        let delay = ctx.backoff.base();
        debug!(key = %key, retry_in = ?delay, "Pass cancelled");
        return Action::requeue(delay);
    }

    let delay = ctx.backoff.record_failure(&key, Fingerprint::of(&target));
    warn!(
        key = %key,
        error = %err,
        failures = ctx.backoff.failures(&key),
        retry_in = ?delay,
        "Reconciliation failed"
    );
    Action::requeue(delay)
}

/// Watch Targets and reconcile them until shutdown.
///
/// `cancel` aborts in-flight store and deployment service calls. The
/// controller itself stops on SIGINT/SIGTERM.
pub async fn run(
    client: Client,
    config: ControllerConfig,
    cancel: watch::Receiver<bool>,
) -> ControllerResult<()> {
    let deployer = HttpDeploymentClient::new(config.service.clone(), config.call_timeout)?;
    let reconciler = Reconciler::new(
        Arc::new(KubeTargetStore::new(client.clone())),
        Arc::new(deployer),
        Arc::new(TargetDescriptorBuilder),
        ReconcilerSettings::from(&config),
    );
    let ctx = Arc::new(ControllerContext::new(reconciler, &config, cancel));

    let targets: Api<Target> = match &config.namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    info!(
        namespace = config.namespace.as_deref().unwrap_or("*"),
        workers = config.workers,
        service = %config.service.base_url,
        "Starting Target controller"
    );

    Controller::new(targets, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(config.workers))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(object = %object, ?action, "Reconciled"),
                Err(e) => warn!(error = %e, "Controller stream error"),
            }
        })
        .await;

    info!("Target controller stopped");
    Ok(())
}
