//! S3-compatible storage backend.
//!
//! Each namespace maps to a bucket. Compatible with AWS S3, MinIO, R2, etc.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Builder, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    operation::get_object::GetObjectError,
    primitives::ByteStream,
    Client,
};
use bytes::Bytes;
use std::path::Path;

use super::backend::{StorageBackend, StorageError, StorageResult};

/// S3 storage backend configuration
#[derive(Clone, Debug)]
pub struct S3Config {
    /// Optional prefix for all keys (e.g., "staging/")
    pub prefix: Option<String>,
    /// AWS region
    pub region: String,
    /// Custom endpoint URL (for MinIO, R2, etc.)
    pub endpoint: Option<String>,
    /// Force path-style URLs (required for MinIO)
    pub force_path_style: bool,
}

impl S3Config {
    /// Create config for AWS S3
    pub fn aws(region: String) -> Self {
        Self {
            prefix: None,
            region,
            endpoint: None,
            force_path_style: false,
        }
    }

    /// Create config for MinIO or other S3-compatible storage
    pub fn minio(endpoint: String) -> Self {
        Self {
            prefix: None,
            region: "us-east-1".to_string(), // MinIO doesn't care about region
            endpoint: Some(endpoint),
            force_path_style: true,
        }
    }

    /// Set a key prefix
    pub fn with_prefix(mut self, prefix: String) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

/// S3-compatible storage backend
pub struct S3Storage {
    client: Client,
    prefix: Option<String>,
}

impl S3Storage {
    /// Create a new S3 storage backend from config, loading credentials from the environment
    pub async fn new(config: S3Config) -> Self {
        let mut builder = Self::builder(&config);

        let sdk_config = aws_config::load_from_env().await;
        if let Some(creds) = sdk_config.credentials_provider() {
            builder = builder.credentials_provider(creds);
        }

        Self {
            client: Client::from_conf(builder.build()),
            prefix: config.prefix,
        }
    }

    /// Create S3 storage with explicit static credentials
    pub fn with_credentials(config: S3Config, access_key: &str, secret_key: &str) -> Self {
        let creds = Credentials::new(access_key, secret_key, None, None, "static");
        let builder = Self::builder(&config).credentials_provider(creds);

        Self {
            client: Client::from_conf(builder.build()),
            prefix: config.prefix,
        }
    }

    fn builder(config: &S3Config) -> Builder {
        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder
    }

    /// Build the full S3 key from the configured prefix and key
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }

    fn map_get_error(err: SdkError<GetObjectError>, namespace: &str, key: &str) -> StorageError {
        if is_status_404(&err) {
            return StorageError::NotFound(format!("{}/{}", namespace, key));
        }
        match err.into_service_error() {
            e if e.is_no_such_key() => StorageError::NotFound(format!("{}/{}", namespace, key)),
            e => StorageError::Other(DisplayErrorContext(&e).to_string()),
        }
    }
}

/// HEAD on a missing key answers with a bare 404 and no error code
fn is_status_404<E>(err: &SdkError<E>) -> bool {
    err.raw_response().map(|r| r.status().as_u16()) == Some(404)
}

fn other<E: std::error::Error>(err: E) -> StorageError {
    StorageError::Other(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes> {
        let s3_key = self.full_key(key);

        let result = self
            .client
            .get_object()
            .bucket(namespace)
            .key(&s3_key)
            .send()
            .await
            .map_err(|e| Self::map_get_error(e, namespace, key))?;

        let data = result
            .body
            .collect()
            .await
            .map_err(other)?;

        Ok(data.into_bytes())
    }

    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<String> {
        let s3_key = self.full_key(key);

        self.client
            .put_object()
            .bucket(namespace)
            .key(&s3_key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(other)?;

        tracing::debug!("Uploaded s3://{}/{}", namespace, s3_key);
        Ok(s3_key)
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let s3_key = self.full_key(key);

        match self
            .client
            .head_object()
            .bucket(namespace)
            .key(&s3_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_status_404(&e) => Ok(false),
            Err(e) => match e.into_service_error() {
                err if err.is_not_found() => Ok(false),
                err => Err(other(err)),
            },
        }
    }

    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        let base_prefix = self.prefix.clone().unwrap_or_default();
        let full_prefix = format!("{}{}", base_prefix, prefix.unwrap_or(""));

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(namespace)
                .prefix(&full_prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let result = request.send().await.map_err(other)?;

            for obj in result.contents.unwrap_or_default() {
                if let Some(key) = obj.key {
                    // Strip the configured prefix to return just the key
                    if let Some(stripped) = key.strip_prefix(&base_prefix) {
                        keys.push(stripped.to_string());
                    }
                }
            }

            if result.is_truncated.unwrap_or(false) {
                continuation_token = result.next_continuation_token;
            } else {
                break;
            }
        }

        keys.sort();
        tracing::info!("Listed {} objects in bucket {}", keys.len(), namespace);
        Ok(keys)
    }

    async fn get_to_file(&self, namespace: &str, key: &str, local_path: &Path) -> StorageResult<()> {
        let s3_key = self.full_key(key);

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::Io)?;
        }

        let result = self
            .client
            .get_object()
            .bucket(namespace)
            .key(&s3_key)
            .send()
            .await
            .map_err(|e| Self::map_get_error(e, namespace, key))?;

        // Stream to file
        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(StorageError::Io)?;

        let mut stream = result.body.into_async_read();
        tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(StorageError::Io)?;

        Ok(())
    }

    async fn put_from_file(&self, namespace: &str, key: &str, local_path: &Path) -> StorageResult<String> {
        let s3_key = self.full_key(key);

        let body = ByteStream::from_path(local_path).await.map_err(other)?;

        self.client
            .put_object()
            .bucket(namespace)
            .key(&s3_key)
            .body(body)
            .send()
            .await
            .map_err(other)?;

        tracing::info!("Uploaded s3://{}/{}", namespace, s3_key);
        Ok(s3_key)
    }
}
