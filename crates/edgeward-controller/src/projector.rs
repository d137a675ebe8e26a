//! Status projection.
//!
//! Every status write goes through [`project`], which builds the whole
//! `TargetStatus` from scratch: nothing from an earlier pass survives.

use chrono::{DateTime, SecondsFormat, Utc};
use edgeward_core::{ErrorDetail, ProvisioningState, ProvisioningStatus, Summary, TargetStatus};
use std::collections::BTreeMap;

/// Values of the `status` property.
pub mod labels {
    pub const OK: &str = "OK";
    pub const RECONCILING: &str = "Reconciling";
    pub const FAILED: &str = "Failed";
    pub const DESCRIPTOR_FAILED: &str = "deploymentCreationFailed";
    pub const PERSIST_FAILED: &str = "State Failed";
}

/// What a status write reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Reconciling,
    Succeeded {
        summary: Summary,
    },
    Failed {
        label: &'static str,
        summary: Summary,
        error: ErrorDetail,
    },
}

impl Projection {
    pub fn state(&self) -> ProvisioningState {
        match self {
            Projection::Reconciling => ProvisioningState::Reconciling,
            Projection::Succeeded { .. } => ProvisioningState::Succeeded,
            Projection::Failed { .. } => ProvisioningState::Failed,
        }
    }
}

/// Render a projection into a complete status.
pub fn project(projection: Projection, operation_id: String, now: DateTime<Utc>) -> TargetStatus {
    let state = projection.state();
    let (label, summary, error) = match projection {
        Projection::Reconciling => (labels::RECONCILING, Summary::default(), None),
        Projection::Succeeded { summary } => (labels::OK, summary, None),
        Projection::Failed {
            label,
            summary,
            error,
        } => (label, summary, Some(error)),
    };

    TargetStatus {
        properties: properties(label, &summary),
        provisioning_status: ProvisioningStatus {
            state,
            operation_id,
            error,
        },
        last_modified: Some(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

fn properties(label: &str, summary: &Summary) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    props.insert("status".to_string(), label.to_string());
    props.insert("targets".to_string(), summary.target_count.to_string());
    props.insert("deployed".to_string(), summary.success_count.to_string());
    for (name, result) in &summary.target_results {
        props.insert(
            format!("targets.{}", name),
            format!("{} - {}", result.status, result.message),
        );
    }
    props
}
