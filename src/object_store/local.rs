//! # Local Filesystem Object Store
//!
//! Each bucket is a directory under `root`; object keys map to relative paths.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::backend::{ListItem, ObjectStore};
use super::errors::{ObjectStoreError, ObjectStoreResult};

/// Filesystem-backed object store
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a new local store rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn bucket_path(&self, bucket: &str) -> ObjectStoreResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(|c| c == '/' || c == '\\') || bucket == ".." {
            return Err(ObjectStoreError::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> ObjectStoreResult<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == ".." || segment.is_empty())
        {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.bucket_path(bucket)?.join(key))
    }
}

fn map_io(key: &str, e: io::Error) -> ObjectStoreError {
    if e.kind() == io::ErrorKind::NotFound {
        ObjectStoreError::ObjectNotFound(key.to_string())
    } else {
        ObjectStoreError::IoError(e.to_string())
    }
}

/// Walk `dir` iteratively, collecting regular files as bucket-relative keys.
async fn collect_files(bucket_root: &Path, out: &mut Vec<ListItem>) -> ObjectStoreResult<()> {
    let mut pending = vec![bucket_root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| ObjectStoreError::IoError(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ObjectStoreError::IoError(e.to_string()))?
        {
            let path = entry.path();
            let meta = entry
                .metadata()
                .await
                .map_err(|e| ObjectStoreError::IoError(e.to_string()))?;

            if meta.is_dir() {
                pending.push(path);
                continue;
            }

            let Ok(relative) = path.strip_prefix(bucket_root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(ListItem::new(key, meta.len()));
        }
    }

    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> ObjectStoreResult<Vec<ListItem>> {
        let bucket_root = self.bucket_path(bucket)?;
        if !fs::try_exists(&bucket_root)
            .await
            .map_err(|e| ObjectStoreError::IoError(e.to_string()))?
        {
            return Err(ObjectStoreError::BucketNotFound(bucket.to_string()));
        }

        let mut items = Vec::new();
        collect_files(&bucket_root, &mut items).await?;

        if let Some(prefix) = prefix {
            items.retain(|item| item.key.starts_with(prefix));
        }
        // Object stores list lexicographically
        items.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(items)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).await.map_err(|e| map_io(key, e))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> ObjectStoreResult<()> {
        let path = self.object_path(bucket, key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::IoError(e.to_string()))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| ObjectStoreError::IoError(e.to_string()))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<()> {
        let path = self.object_path(bucket, key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::IoError(e.to_string())),
        }
    }
}
