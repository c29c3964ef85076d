//! Storage configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{LocalStorage, S3Config, S3Storage, StorageBackend, StorageError, StorageResult};

/// Storage backend type
#[derive(Debug, Clone)]
pub enum StorageType {
    /// Local filesystem storage
    Local { path: PathBuf },
    /// S3-compatible storage (AWS S3, MinIO, R2, etc.)
    S3 {
        config: S3Config,
        credentials: Option<StaticCredentials>,
    },
}

/// Static S3 credentials, as stored in a JSON credentials file.
///
/// ```json
/// {"access_key_id": "...", "secret_access_key": "...", "region": "ap-northeast-2",
///  "bucket_name": "converted", "username": "alice"}
/// ```
#[derive(Clone, Deserialize)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("username", &self.username)
            .finish()
    }
}

impl StaticCredentials {
    /// Load credentials from a JSON file
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            StorageError::Other(format!("Invalid credentials file {}: {}", path.display(), e))
        })
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,
}

impl StorageConfig {
    /// Create config for local storage at the given path
    pub fn local(path: PathBuf) -> Self {
        Self {
            storage_type: StorageType::Local { path },
        }
    }

    /// Create config for S3-compatible storage. Without static credentials the
    /// default AWS provider chain is used.
    pub fn s3(config: S3Config, credentials: Option<StaticCredentials>) -> Self {
        Self {
            storage_type: StorageType::S3 { config, credentials },
        }
    }

    /// Build a storage backend from this config
    pub async fn build(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        match &self.storage_type {
            StorageType::Local { path } => {
                std::fs::create_dir_all(path)?;
                tracing::info!("Using local object storage at {:?}", path);
                Ok(Arc::new(LocalStorage::new(path.clone())))
            }
            StorageType::S3 { config, credentials } => {
                tracing::info!("Using S3 object storage (region={})", config.region);
                let storage = match credentials {
                    Some(creds) => S3Storage::with_credentials(
                        config.clone(),
                        &creds.access_key_id,
                        &creds.secret_access_key,
                    ),
                    None => S3Storage::new(config.clone()).await,
                };
                Ok(Arc::new(storage))
            }
        }
    }
}
