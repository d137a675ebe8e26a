//! Failure classification.
//!
//! The deployment service reports failed deployments as a JSON body holding a
//! `spec` shaped like a [`Summary`]. Anything else is an opaque error and is
//! reported with a generic server-error code.

use edgeward_core::{DeployError, ErrorDetail, Summary, TargetError};
use serde::Deserialize;
use std::error::Error as StdError;

/// Code reported for errors that carry no structured payload.
pub const GENERIC_ERROR_CODE: &str = "500";
pub const FAILURE_MESSAGE: &str = "Deployment failed.";
/// `target` of structured errors: the orchestration service itself.
pub const SERVICE_TARGET: &str = "orchestrator";

#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    #[serde(default)]
    code: Option<serde_json::Value>,
    spec: Summary,
}

/// Outcome of decoding a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReport {
    /// The service returned a per-sub-target report.
    Structured { code: String, summary: Summary },
    /// Anything else, kept as its rendered text.
    Opaque { text: String },
}

impl FailureReport {
    /// Decode `err`, searching its source chain for a rejected service call.
    pub fn decode(err: &(dyn StdError + 'static)) -> Self {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(DeployError::Rejected { status, body }) = e.downcast_ref::<DeployError>() {
                if let Ok(payload) = serde_json::from_str::<ApiErrorPayload>(body) {
                    let code = match payload.code {
                        Some(serde_json::Value::String(code)) if !code.is_empty() => code,
                        Some(serde_json::Value::Number(code)) => code.to_string(),
                        _ => status.to_string(),
                    };
                    return FailureReport::Structured {
                        code,
                        summary: payload.spec,
                    };
                }
            }
            current = e.source();
        }

        FailureReport::Opaque {
            text: err.to_string(),
        }
    }

    /// The summary to project into status alongside this failure.
    pub fn summary(&self) -> Summary {
        match self {
            FailureReport::Structured { summary, .. } => summary.clone(),
            FailureReport::Opaque { .. } => Summary::default(),
        }
    }

    pub fn to_error_detail(&self) -> ErrorDetail {
        match self {
            FailureReport::Structured { code, summary } => ErrorDetail {
                code: code.clone(),
                message: FAILURE_MESSAGE.to_string(),
                target: SERVICE_TARGET.to_string(),
                // BTreeMap iteration keeps details sorted by sub-target name.
                details: summary
                    .target_results
                    .iter()
                    .map(|(name, result)| TargetError {
                        code: result.status.clone(),
                        message: result.message.clone(),
                        target: name.clone(),
                    })
                    .collect(),
            },
            FailureReport::Opaque { text } => ErrorDetail {
                code: GENERIC_ERROR_CODE.to_string(),
                message: format!("{} {}", FAILURE_MESSAGE, text),
                target: String::new(),
                details: Vec::new(),
            },
        }
    }
}

/// Classify any error into the detail reported through status.
pub fn classify(err: &(dyn StdError + 'static)) -> ErrorDetail {
    FailureReport::decode(err).to_error_detail()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControllerError;
    use edgeward_core::StoreError;

    fn rejected(status: u16, body: &str) -> ControllerError {
        ControllerError::Deploy(DeployError::Rejected {
            status,
            body: body.to_string(),
        })
    }

    #[test]
    fn test_structured_single_failure() {
        let err = rejected(
            409,
            r#"{"spec":{"targetCount":1,"successCount":0,"targetResults":{"x":{"status":"409","message":"conflict"}}}}"#,
        );

        let detail = classify(&err);
        assert_eq!(detail.code, "409");
        assert_eq!(detail.message, "Deployment failed.");
        assert_eq!(detail.target, SERVICE_TARGET);
        assert_eq!(
            detail.details,
            vec![TargetError {
                code: "409".into(),
                message: "conflict".into(),
                target: "x".into(),
            }]
        );
    }

    #[test]
    fn test_structured_payload_code_wins_over_status() {
        let err = rejected(
            500,
            r#"{"code":"BadConfig","spec":{"targetResults":{"b":{"status":"Failed","message":"no"},"a":{"status":"OK","message":""}}}}"#,
        );

        let report = FailureReport::decode(&err);
        let detail = report.to_error_detail();
        assert_eq!(detail.code, "BadConfig");
        let targets: Vec<_> = detail.details.iter().map(|d| d.target.as_str()).collect();
        assert_eq!(targets, vec!["a", "b"]);
        assert_eq!(report.summary().target_results.len(), 2);
    }

    #[test]
    fn test_numeric_payload_code() {
        let err = rejected(400, r#"{"code":422,"spec":{}}"#);
        assert_eq!(classify(&err).code, "422");
    }

    #[test]
    fn test_opaque_transport_error() {
        let err = ControllerError::Deploy(DeployError::Transport("connection refused".into()));

        let report = FailureReport::decode(&err);
        assert!(matches!(report, FailureReport::Opaque { .. }));
        assert_eq!(report.summary(), Summary::default());

        let detail = report.to_error_detail();
        assert_eq!(detail.code, GENERIC_ERROR_CODE);
        assert!(detail.message.starts_with("Deployment failed. "));
        assert!(detail.message.contains("connection refused"));
        assert!(detail.details.is_empty());
    }

    #[test]
    fn test_rejected_with_unstructured_body_is_opaque() {
        for body in ["", "<html>bad gateway</html>", r#"{"message":"nope"}"#, "null"] {
            let detail = classify(&rejected(502, body));
            assert_eq!(detail.code, GENERIC_ERROR_CODE, "body {body:?}");
            assert!(detail.details.is_empty());
        }
    }

    #[test]
    fn test_bare_deploy_error_is_decoded() {
        let err = DeployError::Rejected {
            status: 409,
            body: r#"{"spec":{"targetResults":{"x":{"status":"409","message":"conflict"}}}}"#.into(),
        };
        assert_eq!(classify(&err).details.len(), 1);
    }

    #[test]
    fn test_non_deploy_errors_are_opaque() {
        let err = ControllerError::Store(StoreError::Conflict("stale version".into()));
        let detail = classify(&err);
        assert_eq!(detail.code, GENERIC_ERROR_CODE);
        assert!(detail.message.contains("stale version"));
    }
}
