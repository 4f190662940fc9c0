//! # Retried Remote Access
//!
//! [`Remote`] is the only way recovery code touches the bucket. Each call runs
//! inside the caller's [`RetryChain`], so transient store failures are retried
//! and the whole operation respects one deadline and the abort token.

use std::sync::Arc;

use tracing::trace;

use super::backend::{ListItem, ObjectStore};
use super::errors::ObjectStoreError;
use crate::retry::{RetryChain, RetryError};

/// Error of a retried remote call
pub type RemoteError = RetryError<ObjectStoreError>;

/// Bucket client with retries
#[derive(Debug, Clone)]
pub struct Remote {
    store: Arc<dyn ObjectStore>,
}

impl Remote {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Underlying store, for callers that need a single unretried attempt
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        retry: &RetryChain,
    ) -> Result<Vec<ListItem>, RemoteError> {
        trace!(bucket, prefix = prefix.unwrap_or_default(), "listing objects");
        retry
            .retry("list_objects", || self.store.list_objects(bucket, prefix))
            .await
    }

    pub async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        retry: &RetryChain,
    ) -> Result<Vec<u8>, RemoteError> {
        trace!(bucket, key, "downloading object");
        retry
            .retry("get_object", || self.store.get_object(bucket, key))
            .await
    }

    pub async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        retry: &RetryChain,
    ) -> Result<(), RemoteError> {
        trace!(bucket, key, size = data.len(), "uploading object");
        retry
            .retry("put_object", || self.store.put_object(bucket, key, data.clone()))
            .await
    }

    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        retry: &RetryChain,
    ) -> Result<(), RemoteError> {
        trace!(bucket, key, "deleting object");
        retry
            .retry("delete_object", || self.store.delete_object(bucket, key))
            .await
    }
}
