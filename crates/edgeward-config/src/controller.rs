//! Controller configuration parsing.

use crate::{ConfigError, ConfigResult};
use edgeward_core::{OPERATION_ID_ANNOTATION, TARGET_FINALIZER};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_SERVICE_URL: &str = "http://deployment-service:8080/v1alpha2/";
const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_WORKERS: u16 = 4;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(5);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Configuration of the target controller process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub service: ServiceConfig,
    /// Watch a single namespace instead of the whole cluster.
    pub namespace: Option<String>,
    /// Maximum number of Targets reconciled concurrently.
    pub workers: u16,
    /// Deadline applied to every store and deployment service call.
    pub call_timeout: Duration,
    pub finalizer: String,
    pub operation_annotation: String,
    pub backoff: BackoffConfig,
}

/// Where and how to reach the deployment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
}

/// Requeue delays after a failed pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            namespace: None,
            workers: DEFAULT_WORKERS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            finalizer: TARGET_FINALIZER.to_string(),
            operation_annotation: OPERATION_ID_ANNOTATION.to_string(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_SERVICE_URL).expect("default service url is valid"),
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl ControllerConfig {
    /// Load from an optional KDL file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => parse_controller_config(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `EDGEWARD_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("EDGEWARD_SERVICE_URL") {
            self.service.base_url = parse_base_url("EDGEWARD_SERVICE_URL", &url)?;
        }
        if let Some(user) = lookup("EDGEWARD_SERVICE_USERNAME") {
            self.service.username = user;
        }
        if let Some(password) = lookup("EDGEWARD_SERVICE_PASSWORD") {
            self.service.password = password;
        }
        if let Some(ns) = lookup("EDGEWARD_NAMESPACE") {
            self.namespace = Some(ns).filter(|ns| !ns.is_empty());
        }
        if let Some(workers) = lookup("EDGEWARD_WORKERS") {
            self.workers = parse_workers("EDGEWARD_WORKERS", &workers)?;
        }
        if let Some(secs) = lookup("EDGEWARD_CALL_TIMEOUT_SECS") {
            self.call_timeout = parse_secs("EDGEWARD_CALL_TIMEOUT_SECS", &secs)?;
        }
        self.validate()
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.call_timeout.is_zero() {
            return Err(invalid("call-timeout-secs", "must be at least 1"));
        }
        if self.backoff.base > self.backoff.max {
            return Err(invalid("backoff", "base-secs must not exceed max-secs"));
        }
        if self.finalizer.is_empty() {
            return Err(invalid("finalizer", "must not be empty"));
        }
        Ok(())
    }
}

/// Parse controller configuration from KDL text.
pub fn parse_controller_config(kdl: &str) -> ConfigResult<ControllerConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = ControllerConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "service" => {
                if let Some(url) = get_string_prop(node, "url") {
                    config.service.base_url = parse_base_url("service url", &url)?;
                }
                for child in children(node) {
                    match child.name().value() {
                        "username" => {
                            config.service.username = required_string_arg(child, "username")?
                        }
                        "password" => {
                            config.service.password = required_string_arg(child, "password")?
                        }
                        _ => {}
                    }
                }
            }
            "controller" => {
                for child in children(node) {
                    match child.name().value() {
                        "namespace" => {
                            config.namespace = Some(required_string_arg(child, "namespace")?)
                        }
                        "workers" => {
                            let workers = required_int_arg(child, "workers")?;
                            config.workers = u16::try_from(workers)
                                .map_err(|_| invalid("workers", "out of range"))?;
                        }
                        "call-timeout-secs" => {
                            config.call_timeout =
                                secs(required_int_arg(child, "call-timeout-secs")?)?;
                        }
                        "finalizer" => {
                            config.finalizer = required_string_arg(child, "finalizer")?
                        }
                        "operation-annotation" => {
                            config.operation_annotation =
                                required_string_arg(child, "operation-annotation")?
                        }
                        _ => {}
                    }
                }
            }
            "backoff" => {
                if let Some(base) = get_int_prop(node, "base-secs") {
                    config.backoff.base = secs(base)?;
                }
                if let Some(max) = get_int_prop(node, "max-secs") {
                    config.backoff.max = secs(max)?;
                }
            }
            _ => {} // Ignore unknown nodes
        }
    }

    config.validate()?;
    Ok(config)
}

/// Parse a base URL, making sure relative joins keep its last path segment.
fn parse_base_url(field: &str, raw: &str) -> ConfigResult<Url> {
    let mut raw = raw.to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| invalid(field, &e.to_string()))
}

fn parse_workers(field: &str, raw: &str) -> ConfigResult<u16> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(field, &format!("not a worker count: {}", raw)))
}

fn parse_secs(field: &str, raw: &str) -> ConfigResult<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| invalid(field, &format!("not a number of seconds: {}", raw)))
}

fn secs(value: i128) -> ConfigResult<Duration> {
    u64::try_from(value)
        .map(Duration::from_secs)
        .map_err(|_| invalid("duration", &format!("{} is not a valid number of seconds", value)))
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

// Helper functions for extracting values from KDL nodes

fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_int_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

fn required_string_arg(node: &KdlNode, field: &str) -> ConfigResult<String> {
    get_first_string_arg(node).ok_or_else(|| invalid(field, "expected a string argument"))
}

fn required_int_arg(node: &KdlNode, field: &str) -> ConfigResult<i128> {
    get_first_int_arg(node).ok_or_else(|| invalid(field, "expected an integer argument"))
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_int_prop(node: &KdlNode, name: &str) -> Option<i128> {
    node.get(name).and_then(|v| v.as_integer())
}
