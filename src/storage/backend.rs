//! Storage backend trait definition.
//!
//! Provides an abstraction over different object stores (local filesystem, S3, etc.).
//! A namespace is the bucket (S3) or top-level directory (local) an object lives in.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use thiserror::Error;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
    /// Key rejected before touching the backend
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(std::io::Error),
    /// Other error
    #[error("Storage error: {0}")]
    Other(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend trait for pluggable object stores.
///
/// `put` and `put_from_file` return the path the object was stored under, which is what
/// the catalog records as the artifact location.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get an object by namespace and key
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes>;

    /// Put an object by namespace and key, returning the stored path
    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<String>;

    /// Check if an object exists
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List keys in a namespace (with optional prefix), sorted
    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>>;

    /// Stream an object to a local file path
    async fn get_to_file(&self, namespace: &str, key: &str, local_path: &Path) -> StorageResult<()>;

    /// Stream a local file to storage, returning the stored path
    async fn put_from_file(&self, namespace: &str, key: &str, local_path: &Path) -> StorageResult<String>;
}
