//! Watch event filtering.
//!
//! The controller sees an event for every write to a Target, including the
//! status and finalizer writes it makes itself. A pass only needs to run when
//! the Target's spec, its annotations or its deletion intent changed since the
//! last successful pass.

use edgeward_core::{ObjectKey, Target};
use kube::ResourceExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// The parts of a Target that decide whether a pass is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    generation: Option<i64>,
    annotations: BTreeMap<String, String>,
    deleting: bool,
}

impl Fingerprint {
    pub fn of(target: &Target) -> Self {
        Self {
            generation: target.metadata.generation,
            annotations: target.annotations().clone(),
            deleting: target.deletion_requested(),
        }
    }
}

/// Remembers the fingerprint of each key's last successful pass.
#[derive(Debug, Default)]
pub struct TriggerFilter {
    reconciled: Mutex<HashMap<ObjectKey, Fingerprint>>,
}

impl TriggerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `fingerprint` differs from the last successful pass for `key`.
    pub fn should_reconcile(&self, key: &ObjectKey, fingerprint: &Fingerprint) -> bool {
        self.reconciled.lock().get(key) != Some(fingerprint)
    }

    /// Call only after a pass succeeded.
    pub fn record(&self, key: &ObjectKey, fingerprint: Fingerprint) {
        self.reconciled.lock().insert(key.clone(), fingerprint);
    }

    pub fn forget(&self, key: &ObjectKey) {
        self.reconciled.lock().remove(key);
    }
}
