//! Core domain types and traits for the Edgeward target controller.
//!
//! This crate contains:
//! - The `Target` custom resource and its status model
//! - Deployment summaries and error details reported by the deployment service
//! - Deployment descriptors and the default descriptor builder
//! - Collaborator traits for the resource store and the deployment service

pub mod deployer;
pub mod descriptor;
pub mod key;
pub mod store;
pub mod summary;
pub mod target;

pub use deployer::{DeployError, DeploymentClient};
pub use descriptor::{Descriptor, DescriptorBuilder, DescriptorError, TargetDescriptorBuilder};
pub use key::ObjectKey;
pub use store::{StoreError, StoreResult, TargetStore};
pub use summary::{ErrorDetail, Summary, TargetError, TargetResult};
pub use target::{
    BindingSpec, ComponentSpec, OPERATION_ID_ANNOTATION, ProvisioningState, ProvisioningStatus,
    TARGET_FINALIZER, Target, TargetSpec, TargetStatus, TopologySpec,
};
