//! Deployment descriptors.
//!
//! A [`Descriptor`] is the deployment-service-ready form of a Target: a
//! solution holding the Target's components, an instance binding that solution
//! to the Target, and the component assignments per sub-target.

use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::target::{ComponentSpec, Target, TopologySpec};

const DEFAULT_SCOPE: &str = "default";
const RUNTIME_PREFIX: &str = "target-runtime";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("component at index {0} has no name")]
    UnnamedComponent(usize),

    #[error("component {0} is defined more than once")]
    DuplicateComponent(String),

    #[error("component {0} has no type")]
    UntypedComponent(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub solution_name: String,
    pub scope: String,
    pub solution: SolutionSpec,
    pub instance: InstanceSpec,
    pub targets: BTreeMap<String, RuntimeTarget>,
    /// Component names assigned to each sub-target.
    pub assignments: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSpec {
    pub display_name: String,
    pub scope: String,
    pub components: Vec<ComponentSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub name: String,
    pub display_name: String,
    pub scope: String,
    pub solution: String,
    pub target: String,
}

/// The subset of a Target's spec the deployment service acts on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTarget {
    pub display_name: String,
    pub scope: String,
    pub metadata: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
    pub topologies: Vec<TopologySpec>,
    pub force_redeploy: bool,
}

impl Descriptor {
    /// Total number of component placements.
    pub fn assignment_count(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }
}

/// Translates a Target into a [`Descriptor`].
pub trait DescriptorBuilder: Send + Sync {
    fn build(&self, target: &Target) -> Result<Descriptor, DescriptorError>;
}

/// Builds one runtime sub-target per Target and assigns every component whose
/// constraints match the Target's properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetDescriptorBuilder;

impl DescriptorBuilder for TargetDescriptorBuilder {
    fn build(&self, target: &Target) -> Result<Descriptor, DescriptorError> {
        let spec = &target.spec;
        validate_components(&spec.components)?;

        let key = format!("{}-{}", RUNTIME_PREFIX, target.name_any());
        let scope = spec
            .scope
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SCOPE)
            .to_string();

        let runtime = RuntimeTarget {
            display_name: spec.display_name.clone().unwrap_or_else(|| key.clone()),
            scope: scope.clone(),
            metadata: spec.metadata.clone(),
            properties: spec.properties.clone(),
            topologies: spec.topologies.clone(),
            force_redeploy: spec.force_redeploy,
        };

        let assigned: Vec<String> = spec
            .components
            .iter()
            .filter(|c| constraints_match(c, &spec.properties))
            .map(|c| c.name.clone())
            .collect();

        let mut assignments = BTreeMap::new();
        if !assigned.is_empty() {
            assignments.insert(key.clone(), assigned);
        }

        Ok(Descriptor {
            solution_name: key.clone(),
            scope: scope.clone(),
            solution: SolutionSpec {
                display_name: key.clone(),
                scope: scope.clone(),
                components: spec.components.clone(),
            },
            instance: InstanceSpec {
                name: key.clone(),
                display_name: key.clone(),
                scope,
                solution: key.clone(),
                target: key.clone(),
            },
            targets: BTreeMap::from([(key, runtime)]),
            assignments,
        })
    }
}

fn validate_components(components: &[ComponentSpec]) -> Result<(), DescriptorError> {
    let mut seen = HashSet::new();
    for (idx, component) in components.iter().enumerate() {
        if component.name.is_empty() {
            return Err(DescriptorError::UnnamedComponent(idx));
        }
        if !seen.insert(component.name.as_str()) {
            return Err(DescriptorError::DuplicateComponent(component.name.clone()));
        }
        if component.component_type.is_empty() {
            return Err(DescriptorError::UntypedComponent(component.name.clone()));
        }
    }
    Ok(())
}

fn constraints_match(component: &ComponentSpec, properties: &BTreeMap<String, String>) -> bool {
    component
        .constraints
        .iter()
        .all(|(k, v)| properties.get(k) == Some(v))
}
