//! # Object Store Trait

use async_trait::async_trait;

use super::errors::ObjectStoreResult;

/// One entry of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Full object key
    pub key: String,

    /// Object size in bytes
    pub size_bytes: u64,
}

impl ListItem {
    pub fn new(key: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            size_bytes,
        }
    }
}

/// Backend trait for bucket-oriented object storage.
///
/// Implementations must be safe to call concurrently. Each call is a single
/// attempt; retries are layered on top by [`crate::object_store::Remote`].
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// List every object in `bucket` whose key starts with `prefix`.
    /// Pagination is resolved by the implementation.
    async fn list_objects(&self, bucket: &str, prefix: Option<&str>)
        -> ObjectStoreResult<Vec<ListItem>>;

    /// Read the full body of an object
    async fn get_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<Vec<u8>>;

    /// Write an object, replacing any previous body
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> ObjectStoreResult<()>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<()>;
}
