//! Deployment outcomes reported by the deployment service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-sub-target outcome of a deploy or remove call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub target_count: usize,
    #[serde(default)]
    pub success_count: usize,
    #[serde(default)]
    pub target_results: BTreeMap<String, TargetResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl Summary {
    /// Summary standing in for a deployment that never reached the service.
    pub fn single_failure(subtarget: impl Into<String>, message: impl Into<String>) -> Self {
        let mut target_results = BTreeMap::new();
        target_results.insert(
            subtarget.into(),
            TargetResult {
                status: "Failed".to_string(),
                message: message.into(),
            },
        );
        Self {
            target_count: 1,
            success_count: 0,
            target_results,
        }
    }
}

/// Error reported through `status.provisioningStatus.error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<TargetError>,
}

/// One failing (or reporting) sub-target inside an [`ErrorDetail`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetError {
    pub code: String,
    pub message: String,
    pub target: String,
}
