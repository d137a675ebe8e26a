//! Kubernetes-backed [`TargetStore`].

use async_trait::async_trait;
use edgeward_core::{ObjectKey, StoreError, StoreResult, Target, TargetStore};
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};

/// Reads and writes Targets through the API server. Writes use `replace`, so
/// the object's resource version guards against concurrent modification.
#[derive(Clone)]
pub struct KubeTargetStore {
    client: Client,
}

impl KubeTargetStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Target> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn api_for(&self, target: &Target) -> StoreResult<(Api<Target>, String)> {
        let namespace = target
            .namespace()
            .ok_or_else(|| StoreError::NotFound(format!("{} has no namespace", target.name_any())))?;
        Ok((self.api(&namespace), target.name_any()))
    }
}

#[async_trait]
impl TargetStore for KubeTargetStore {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Option<Target>> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(store_error)
    }

    async fn update(&self, target: &Target) -> StoreResult<Target> {
        let (api, name) = self.api_for(target)?;
        api.replace(&name, &PostParams::default(), target)
            .await
            .map_err(store_error)
    }

    async fn update_status(&self, target: &Target) -> StoreResult<Target> {
        let (api, name) = self.api_for(target)?;
        let body = serde_json::to_vec(target)
            .map_err(|e| StoreError::Transient(format!("encode {}: {}", name, e)))?;
        api.replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(store_error)
    }
}

fn store_error(err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => StoreError::NotFound(resp.message),
        kube::Error::Api(resp) if resp.code == 409 => StoreError::Conflict(resp.message),
        other => StoreError::Transient(other.to_string()),
    }
}
