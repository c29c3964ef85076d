//! Storage backend abstraction.
//!
//! Provides a pluggable object store that can be backed by:
//! - Local filesystem (default)
//! - S3-compatible object storage (AWS S3, MinIO, R2, etc.)

mod backend;
mod config;
mod local;
mod s3;

pub use backend::{StorageBackend, StorageError, StorageResult};
pub use config::{StaticCredentials, StorageConfig, StorageType};
pub use local::LocalStorage;
pub use s3::{S3Config, S3Storage};
