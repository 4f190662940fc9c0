//! # In-Memory Object Store
//!
//! Keeps buckets in process memory and records every operation. Failures can
//! be injected per operation and key prefix, which makes it the store of
//! choice for exercising retry and partial-failure paths.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{ListItem, ObjectStore};
use super::errors::{ObjectStoreError, ObjectStoreResult};

/// Kind of store operation, used for recording and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOpKind {
    List,
    Get,
    Put,
    Delete,
}

/// Record of one store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    pub kind: StoreOpKind,
    pub bucket: String,
    /// Key for get/put/delete, prefix for list
    pub key: String,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    kind: StoreOpKind,
    key_prefix: String,
    /// `None` fails forever
    remaining: Option<usize>,
    error: ObjectStoreError,
}

type Buckets = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// In-memory object store with operation tracing
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<Mutex<Buckets>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    failures: Arc<Mutex<Vec<InjectedFailure>>>,
    latency: Option<Duration>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one empty bucket
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store.create_bucket(bucket);
        store
    }

    /// Create a store that sleeps before every call
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Create an empty bucket if it does not exist
    pub fn create_bucket(&self, bucket: &str) {
        lock(&self.buckets).entry(bucket.to_string()).or_default();
    }

    /// Insert an object directly, bypassing recording and failure injection
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        lock(&self.buckets)
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    /// Whether an object exists
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        lock(&self.buckets)
            .get(bucket)
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    /// All keys in a bucket, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.buckets)
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All recorded operations
    pub fn operations(&self) -> Vec<StoreOp> {
        lock(&self.operations).clone()
    }

    /// Number of recorded operations of one kind
    pub fn count(&self, kind: StoreOpKind) -> usize {
        lock(&self.operations)
            .iter()
            .filter(|op| op.kind == kind)
            .count()
    }

    /// Clear recorded operations
    pub fn clear_operations(&self) {
        lock(&self.operations).clear();
    }

    /// Fail every `kind` call whose key starts with `key_prefix`
    pub fn fail_always(&self, kind: StoreOpKind, key_prefix: &str, error: ObjectStoreError) {
        lock(&self.failures).push(InjectedFailure {
            kind,
            key_prefix: key_prefix.to_string(),
            remaining: None,
            error,
        });
    }

    /// Fail the next `times` matching calls, then succeed
    pub fn fail_times(
        &self,
        kind: StoreOpKind,
        key_prefix: &str,
        times: usize,
        error: ObjectStoreError,
    ) {
        lock(&self.failures).push(InjectedFailure {
            kind,
            key_prefix: key_prefix.to_string(),
            remaining: Some(times),
            error,
        });
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    async fn begin(&self, kind: StoreOpKind, bucket: &str, key: &str) -> ObjectStoreResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        lock(&self.operations).push(StoreOp {
            kind,
            bucket: bucket.to_string(),
            key: key.to_string(),
        });

        let mut failures = lock(&self.failures);
        let hit = failures
            .iter_mut()
            .find(|f| f.kind == kind && key.starts_with(&f.key_prefix) && f.remaining != Some(0));

        match hit {
            Some(failure) => {
                if let Some(remaining) = failure.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(failure.error.clone())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> ObjectStoreResult<Vec<ListItem>> {
        self.begin(StoreOpKind::List, bucket, prefix.unwrap_or_default())
            .await?;

        let buckets = lock(&self.buckets);
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| ObjectStoreError::BucketNotFound(bucket.to_string()))?;

        Ok(objects
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, data)| ListItem::new(key.clone(), data.len() as u64))
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<Vec<u8>> {
        self.begin(StoreOpKind::Get, bucket, key).await?;

        let buckets = lock(&self.buckets);
        buckets
            .get(bucket)
            .ok_or_else(|| ObjectStoreError::BucketNotFound(bucket.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::ObjectNotFound(key.to_string()))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> ObjectStoreResult<()> {
        self.begin(StoreOpKind::Put, bucket, key).await?;

        lock(&self.buckets)
            .get_mut(bucket)
            .ok_or_else(|| ObjectStoreError::BucketNotFound(bucket.to_string()))?
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<()> {
        self.begin(StoreOpKind::Delete, bucket, key).await?;

        if let Some(objects) = lock(&self.buckets).get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }
}
