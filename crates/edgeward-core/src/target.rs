//! The `Target` custom resource.
//!
//! A Target describes an edge compute node or device that the controller drives
//! toward a deployed state through the external deployment service. Everything
//! the controller learns about that deployment is reported back through
//! [`TargetStatus`].

use derive_more::Display;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::summary::ErrorDetail;

/// Finalizer token owned by the target controller.
pub const TARGET_FINALIZER: &str = "target.fabric.edgeward.io/finalizer";

/// Annotation carrying an externally assigned operation identifier.
pub const OPERATION_ID_ANNOTATION: &str = "management.edgeward.io/operation-id";

/// Target is the Schema for the targets API.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fabric.edgeward.io",
    version = "v1",
    kind = "Target",
    plural = "targets",
    namespaced,
    status = "TargetStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.provisioningStatus.state"}"#,
    printcolumn = r#"{"name":"Operation", "type":"string", "jsonPath":".status.provisioningStatus.operationId"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// Human readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Deployment scope. Empty means `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Free-form metadata passed through to the deployment service.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Properties of the device, matched against component constraints.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Components to deploy onto the target.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentSpec>,

    /// How the deployment service reaches the device.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topologies: Vec<TopologySpec>,

    /// Redeploy even when the service believes nothing changed.
    #[serde(default)]
    pub force_redeploy: bool,
}

/// A component to place on the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub component_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Target properties that must match for the component to be assigned.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopologySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<BindingSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BindingSpec {
    pub role: String,
    pub provider: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

/// Observed state of a Target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    /// Flat summary of the last pass. Replaced as a whole on every write.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default)]
    pub provisioning_status: ProvisioningStatus,

    /// RFC 3339 timestamp of the last status write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Provisioning outcome as seen by clients polling the resource.
///
/// `error` is only ever set when `state` is [`ProvisioningState::Failed`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningStatus {
    pub state: ProvisioningState,

    #[serde(default)]
    pub operation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Display,
)]
pub enum ProvisioningState {
    #[default]
    Reconciling,
    Succeeded,
    Failed,
}

impl Target {
    /// Whether deletion has been requested for this object.
    pub fn deletion_requested(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Operation id from the given annotation, or empty when unset.
    pub fn operation_id(&self, annotation: &str) -> String {
        self.annotations().get(annotation).cloned().unwrap_or_default()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Add the finalizer. Returns `false` when it was already present.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers_mut().push(finalizer.to_string());
        true
    }

    /// Remove the finalizer. Returns `false` when it was not present.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let finalizers = self.finalizers_mut();
        let before = finalizers.len();
        finalizers.retain(|f| f != finalizer);
        finalizers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn target() -> Target {
        let mut t = Target::new("gateway-01", TargetSpec::default());
        t.metadata.namespace = Some("edge".into());
        t
    }

    #[test]
    fn test_finalizer_add_remove() {
        let mut t = target();
        assert!(!t.has_finalizer(TARGET_FINALIZER));
        assert!(t.add_finalizer(TARGET_FINALIZER));
        assert!(!t.add_finalizer(TARGET_FINALIZER));
        assert_eq!(t.finalizers().len(), 1);

        t.finalizers_mut().push("other.io/keep".into());
        assert!(t.remove_finalizer(TARGET_FINALIZER));
        assert!(!t.remove_finalizer(TARGET_FINALIZER));
        assert_eq!(t.finalizers(), &["other.io/keep".to_string()]);
    }

    #[test]
    fn test_operation_id_from_annotation() {
        let mut t = target();
        assert_eq!(t.operation_id(OPERATION_ID_ANNOTATION), "");

        t.annotations_mut()
            .insert(OPERATION_ID_ANNOTATION.into(), "op-42".into());
        assert_eq!(t.operation_id(OPERATION_ID_ANNOTATION), "op-42");
    }

    #[test]
    fn test_deletion_requested() {
        let mut t = target();
        assert!(!t.deletion_requested());
        t.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert!(t.deletion_requested());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = TargetStatus {
            provisioning_status: ProvisioningStatus {
                state: ProvisioningState::Failed,
                operation_id: "op".into(),
                error: None,
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["provisioningStatus"]["state"], "Failed");
        assert_eq!(json["provisioningStatus"]["operationId"], "op");
        assert!(json["provisioningStatus"].get("error").is_none());
    }
}
