//! Local filesystem storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::backend::{StorageBackend, StorageError, StorageResult};

/// Local filesystem storage backend.
///
/// Stores objects in a directory structure mirroring the key:
/// ```text
/// {base_path}/
///   {namespace}/
///     {key segments...}
/// ```
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn namespace_path(&self, namespace: &str) -> StorageResult<PathBuf> {
        validate_relative(namespace)?;
        Ok(self.base_path.join(namespace))
    }

    /// Get the full path for a key
    fn key_path(&self, namespace: &str, key: &str) -> StorageResult<PathBuf> {
        validate_relative(key)?;
        Ok(self.namespace_path(namespace)?.join(key))
    }

    /// Ensure parent directory exists
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Rejects keys that could escape the storage root.
fn validate_relative(key: &str) -> StorageResult<()> {
    let clean = !key.is_empty()
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if clean {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

fn not_found_or_io(e: std::io::Error, namespace: &str, key: &str) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(format!("{}/{}", namespace, key))
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(namespace, key)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, namespace, key))?;
        Ok(Bytes::from(data))
    }

    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<String> {
        let path = self.key_path(namespace, key)?;
        self.ensure_parent(&path).await?;
        fs::write(&path, &data).await?;
        Ok(key.to_string())
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let path = self.key_path(namespace, key)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        let ns_path = self.namespace_path(namespace)?;
        if !ns_path.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![ns_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                // Rebuild the key from the path below the namespace root
                let Ok(relative) = path.strip_prefix(&ns_path) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if let Some(p) = prefix {
                    if !key.starts_with(p) {
                        continue;
                    }
                }

                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn get_to_file(&self, namespace: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        let src_path = self.key_path(namespace, key)?;

        // For local storage, we can just copy
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(&src_path, local_path)
            .await
            .map_err(|e| not_found_or_io(e, namespace, key))?;

        Ok(())
    }

    async fn put_from_file(&self, namespace: &str, key: &str, local_path: &Path) -> StorageResult<String> {
        let dest_path = self.key_path(namespace, key)?;
        self.ensure_parent(&dest_path).await?;

        fs::copy(local_path, &dest_path).await?;

        Ok(key.to_string())
    }
}
