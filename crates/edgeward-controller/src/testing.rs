//! In-memory collaborators for reconciler tests.

use async_trait::async_trait;
use edgeward_core::{
    ComponentSpec, DeployError, DeploymentClient, Descriptor, DescriptorBuilder, DescriptorError,
    ObjectKey, StoreError, StoreResult, Summary, Target, TargetSpec, TargetStatus, TargetStore,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const NAMESPACE: &str = "edge";

pub fn target(name: &str, components: Vec<ComponentSpec>) -> Target {
    let mut target = Target::new(
        name,
        TargetSpec {
            components,
            ..Default::default()
        },
    );
    target.metadata.namespace = Some(NAMESPACE.to_string());
    target
}

pub fn component(name: &str) -> ComponentSpec {
    ComponentSpec {
        name: name.to_string(),
        component_type: "container".to_string(),
        ..Default::default()
    }
}

/// Ordered record of calls made against the fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// A kind of store write, for scheduling a deletion mid-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Update,
    Status,
}

/// Store with resource-version checks and API-server-like deletion: an object
/// with a deletion timestamp disappears once its last finalizer is removed.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ObjectKey, Target>>,
    status_writes: Mutex<HashMap<ObjectKey, Vec<TargetStatus>>>,
    fail_update: Mutex<Option<StoreError>>,
    fail_status: Mutex<Option<StoreError>>,
    vanish: Mutex<Option<(Write, usize)>>,
    update_calls: AtomicUsize,
    status_calls: AtomicUsize,
    journal: Journal,
}

impl MemoryStore {
    pub fn insert(&self, mut target: Target) -> ObjectKey {
        if target.metadata.namespace.is_none() {
            target.metadata.namespace = Some(NAMESPACE.to_string());
        }
        target.metadata.resource_version = Some("1".to_string());
        let key = ObjectKey::of(&target);
        self.objects.lock().insert(key.clone(), target);
        key
    }

    pub fn stored(&self, key: &ObjectKey) -> Option<Target> {
        self.objects.lock().get(key).cloned()
    }

    pub fn request_deletion(&self, key: &ObjectKey) {
        if let Some(target) = self.objects.lock().get_mut(key) {
            target.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        }
    }

    pub fn status_writes(&self, key: &ObjectKey) -> Vec<TargetStatus> {
        self.status_writes
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_next_update(&self, err: StoreError) {
        *self.fail_update.lock() = Some(err);
    }

    pub fn fail_next_status_write(&self, err: StoreError) {
        *self.fail_status.lock() = Some(err);
    }

    /// Delete the object right before the `nth` write of the given kind,
    /// counting from 1.
    pub fn vanish_before(&self, write: Write, nth: usize) {
        *self.vanish.lock() = Some((write, nth));
    }

    fn maybe_vanish(&self, write: Write, key: &ObjectKey) {
        let calls = match write {
            Write::Update => &self.update_calls,
            Write::Status => &self.status_calls,
        };
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.vanish.lock() == Some((write, n)) {
            self.objects.lock().remove(key);
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Check the incoming version against the stored object.
    fn current(
        objects: &HashMap<ObjectKey, Target>,
        key: &ObjectKey,
        incoming: &Target,
    ) -> StoreResult<Target> {
        let stored = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if stored.resource_version() != incoming.resource_version() {
            return Err(StoreError::Conflict(format!(
                "{} has version {:?}",
                key,
                stored.resource_version()
            )));
        }
        Ok(stored.clone())
    }
}

fn bump(target: &mut Target) {
    let next = target
        .resource_version()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    target.metadata.resource_version = Some(next.to_string());
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Option<Target>> {
        Ok(self.stored(key))
    }

    async fn update(&self, target: &Target) -> StoreResult<Target> {
        self.journal.record("update");
        if let Some(err) = self.fail_update.lock().take() {
            return Err(err);
        }

        let key = ObjectKey::of(target);
        self.maybe_vanish(Write::Update, &key);
        let mut objects = self.objects.lock();
        let stored = Self::current(&objects, &key, target)?;

        let mut next = target.clone();
        next.status = stored.status;
        bump(&mut next);

        if next.deletion_requested() && next.finalizers().is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, next.clone());
        }
        Ok(next)
    }

    async fn update_status(&self, target: &Target) -> StoreResult<Target> {
        let state = target
            .status
            .as_ref()
            .map(|s| s.provisioning_status.state.to_string())
            .unwrap_or_default();
        self.journal.record(format!("status {}", state));
        if let Some(err) = self.fail_status.lock().take() {
            return Err(err);
        }

        let key = ObjectKey::of(target);
        self.maybe_vanish(Write::Status, &key);
        let mut objects = self.objects.lock();
        let mut next = Self::current(&objects, &key, target)?;
        next.status = target.status.clone();
        bump(&mut next);
        objects.insert(key.clone(), next.clone());

        if let Some(status) = &next.status {
            self.status_writes
                .lock()
                .entry(key)
                .or_default()
                .push(status.clone());
        }
        Ok(next)
    }
}

type Scripted = Mutex<VecDeque<Result<Summary, DeployError>>>;

/// Deployment client answering from queued results. An empty queue answers
/// with an empty summary.
#[derive(Default)]
pub struct ScriptedDeployer {
    deploys: Scripted,
    removes: Scripted,
    deploy_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    hang: AtomicBool,
    journal: Journal,
}

impl ScriptedDeployer {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn push_deploy(&self, result: Result<Summary, DeployError>) {
        self.deploys.lock().push_back(result);
    }

    pub fn push_remove(&self, result: Result<Summary, DeployError>) {
        self.removes.lock().push_back(result);
    }

    /// Make every later deploy call block forever.
    pub fn hang_deploy(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn deploy_calls(&self) -> usize {
        self.deploy_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeploymentClient for ScriptedDeployer {
    async fn deploy(&self, _descriptor: &Descriptor) -> Result<Summary, DeployError> {
        self.journal.record("deploy");
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.deploys.lock().pop_front();
        next.unwrap_or_else(|| Ok(Summary::default()))
    }

    async fn remove(&self, _descriptor: &Descriptor) -> Result<Summary, DeployError> {
        self.journal.record("remove");
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.removes.lock().pop_front();
        next.unwrap_or_else(|| Ok(Summary::default()))
    }
}

/// Builder that rejects every Target.
pub struct FailingBuilder;

impl DescriptorBuilder for FailingBuilder {
    fn build(&self, _target: &Target) -> Result<Descriptor, DescriptorError> {
        Err(DescriptorError::UntypedComponent("a".into()))
    }
}
