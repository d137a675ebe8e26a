//! KDL configuration parsing for the Edgeward target controller.
//!
//! A configuration file looks like:
//!
//! ```kdl
//! service url="http://deployment-service:8080/v1alpha2/" {
//!     username "admin"
//!     password ""
//! }
//! controller {
//!     namespace "edge"
//!     workers 8
//!     call-timeout-secs 30
//! }
//! backoff base-secs=5 max-secs=300
//! ```
//!
//! Every value has a default, and `EDGEWARD_*` environment variables override
//! whatever the file says.

pub mod controller;
pub mod error;

pub use controller::{BackoffConfig, ControllerConfig, ServiceConfig, parse_controller_config};
pub use error::{ConfigError, ConfigResult};
