//! Resource store trait.
//!
//! The store persists [`Target`] objects with optimistic concurrency: every
//! write carries the object's resource version and fails with
//! [`StoreError::Conflict`] when that version is stale.

use async_trait::async_trait;
use thiserror::Error;

use crate::key::ObjectKey;
use crate::target::Target;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The write was made against a stale resource version.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure or server error. Safe to retry.
    #[error("transient store error: {0}")]
    Transient(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Access to stored `Target` objects.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Fetch the current object. `Ok(None)` when it does not exist.
    async fn get(&self, key: &ObjectKey) -> StoreResult<Option<Target>>;

    /// Persist metadata and spec. The status subtree is ignored.
    async fn update(&self, target: &Target) -> StoreResult<Target>;

    /// Persist the status subtree only.
    async fn update_status(&self, target: &Target) -> StoreResult<Target>;
}
