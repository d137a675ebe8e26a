//! HTTP client for the deployment service.
//!
//! Implements [`edgeward_core::DeploymentClient`] against the service's REST
//! API: authenticate, then POST (deploy) or DELETE (remove) the descriptor on
//! `solution/instances`.

pub mod http;

pub use http::HttpDeploymentClient;
