//! reqwest-backed deployment client.

use async_trait::async_trait;
use edgeward_config::ServiceConfig;
use edgeward_core::{DeployError, Descriptor, DeploymentClient, Summary};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const AUTH_PATH: &str = "users/auth";
const INSTANCES_PATH: &str = "solution/instances";

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(default)]
    access_token: String,
}

/// Deployment service client.
///
/// Every call authenticates first; the service hands out short-lived tokens
/// and the controller makes few calls per pass.
pub struct HttpDeploymentClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpDeploymentClient {
    pub fn new(config: ServiceConfig, timeout: Duration) -> Result<Self, DeployError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edgeward-controller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeployError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DeployError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| DeployError::Transport(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn authenticate(&self) -> Result<String, DeployError> {
        let response = self
            .client
            .post(self.endpoint(AUTH_PATH)?)
            .json(&AuthRequest {
                username: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DeployError::Unauthorized(format!("{}: {}", status, text)));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| DeployError::Decode(e.to_string()))?;

        if auth.access_token.is_empty() {
            return Err(DeployError::Unauthorized(
                "no access token in response".to_string(),
            ));
        }

        Ok(auth.access_token)
    }

    async fn call(&self, method: Method, descriptor: &Descriptor) -> Result<Summary, DeployError> {
        let token = self.authenticate().await?;

        tracing::debug!(
            %method,
            solution = %descriptor.solution_name,
            assignments = descriptor.assignment_count(),
            "Calling deployment service"
        );

        let response = self
            .client
            .request(method, self.endpoint(INSTANCES_PATH)?)
            .bearer_auth(token)
            .json(descriptor)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(request_error)?;
        decode_summary(status, &body)
    }
}

#[async_trait]
impl DeploymentClient for HttpDeploymentClient {
    async fn deploy(&self, descriptor: &Descriptor) -> Result<Summary, DeployError> {
        self.call(Method::POST, descriptor).await
    }

    async fn remove(&self, descriptor: &Descriptor) -> Result<Summary, DeployError> {
        self.call(Method::DELETE, descriptor).await
    }
}

/// Turn a service response into a summary, keeping rejected bodies verbatim.
fn decode_summary(status: StatusCode, body: &str) -> Result<Summary, DeployError> {
    if !status.is_success() {
        return Err(DeployError::Rejected {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    if body.trim().is_empty() {
        return Ok(Summary::default());
    }
    serde_json::from_str(body).map_err(|e| DeployError::Decode(e.to_string()))
}

fn request_error(err: reqwest::Error) -> DeployError {
    if err.is_timeout() {
        DeployError::Timeout(err.to_string())
    } else {
        DeployError::Transport(err.to_string())
    }
}
