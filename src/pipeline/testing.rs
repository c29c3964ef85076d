//! In-process doubles for pipeline tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use super::{ArtifactNamespace, Pipeline, PipelineSettings};
use crate::catalog::{test_repository, ImageryRecord, ImageryRepository, NewImageryRecord, Page, PageRequest, SearchCriteria, SqlImageryRepository};
use crate::conversion::{ConversionError, ConversionService, RasterMetadata};
use crate::storage::{LocalStorage, StorageBackend, StorageError, StorageResult};

pub const SOURCE_BUCKET: &str = "scenes";
pub const ARTIFACT_BUCKET: &str = "artifacts";
pub const OWNER: &str = "alice";

/// Converter that answers from fixed metadata and prefixes the payload to fake a COG.
pub struct FakeConverter {
    pub metadata: RasterMetadata,
    failing: HashSet<String>,
    pub convert_calls: AtomicUsize,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self {
            metadata: RasterMetadata {
                width: 2048,
                height: 2048,
                band_count: 3,
                projection: Some("EPSG:4326".to_string()),
            },
            failing: HashSet::new(),
            convert_calls: AtomicUsize::new(0),
        }
    }

    /// Metadata extraction fails for these file names.
    pub fn failing_on(mut self, file_names: &[&str]) -> Self {
        self.failing = file_names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: RasterMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[async_trait]
impl ConversionService for FakeConverter {
    async fn extract_metadata(&self, file_name: &str, _data: Bytes) -> Result<RasterMetadata, ConversionError> {
        if self.failing.contains(file_name) {
            return Err(ConversionError::Status {
                operation: "extractMetadata",
                status: 500,
                body: format!("cannot open {}", file_name),
            });
        }
        Ok(self.metadata.clone())
    }

    async fn convert_to_cog(&self, _file_name: &str, data: Bytes) -> Result<Bytes, ConversionError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        let mut cog = b"COG:".to_vec();
        cog.extend_from_slice(&data);
        Ok(Bytes::from(cog))
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Storage wrapper whose uploads can be switched to fail.
pub struct FlakyStorage {
    inner: LocalStorage,
    pub fail_uploads: AtomicBool,
}

impl FlakyStorage {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            fail_uploads: AtomicBool::new(false),
        }
    }

    fn check_upload(&self) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Other("upload rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FlakyStorage {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Bytes> {
        self.inner.get(namespace, key).await
    }

    async fn put(&self, namespace: &str, key: &str, data: Bytes) -> StorageResult<String> {
        self.check_upload()?;
        self.inner.put(namespace, key, data).await
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.inner.exists(namespace, key).await
    }

    async fn list(&self, namespace: &str, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        self.inner.list(namespace, prefix).await
    }

    async fn get_to_file(&self, namespace: &str, key: &str, path: &Path) -> StorageResult<()> {
        self.inner.get_to_file(namespace, key, path).await
    }

    async fn put_from_file(&self, namespace: &str, key: &str, path: &Path) -> StorageResult<String> {
        self.check_upload()?;
        self.inner.put_from_file(namespace, key, path).await
    }
}

/// Repository wrapper whose saves can be switched to fail.
pub struct FlakyRepository {
    inner: SqlImageryRepository,
    pub fail_saves: AtomicBool,
}

#[async_trait]
impl ImageryRepository for FlakyRepository {
    async fn save(&self, record: NewImageryRecord) -> Result<ImageryRecord, sea_orm::DbErr> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(sea_orm::DbErr::Custom("disk full".to_string()));
        }
        self.inner.save(record).await
    }

    async fn max_sequence(&self, base_name: &str) -> Result<Option<i32>, sea_orm::DbErr> {
        self.inner.max_sequence(base_name).await
    }

    async fn search(&self, criteria: &SearchCriteria, request: &PageRequest) -> Result<Page<ImageryRecord>, sea_orm::DbErr> {
        self.inner.search(criteria, request).await
    }
}

/// A pipeline over local storage and a scratch catalog.
pub struct Harness {
    _db_dir: TempDir,
    _store_dir: TempDir,
    pub temp_root: TempDir,
    pub store: Arc<FlakyStorage>,
    pub repository: Arc<FlakyRepository>,
    pub converter: Arc<FakeConverter>,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_converter(FakeConverter::new()).await
    }

    pub async fn with_converter(converter: FakeConverter) -> Self {
        let (db_dir, repository) = test_repository().await;
        let store_dir = TempDir::new().unwrap();
        let temp_root = TempDir::new().unwrap();

        let store = Arc::new(FlakyStorage::new(LocalStorage::new(store_dir.path().to_path_buf())));
        let repository = Arc::new(FlakyRepository {
            inner: repository,
            fail_saves: AtomicBool::new(false),
        });
        let converter = Arc::new(converter);

        let settings = PipelineSettings {
            source_bucket: SOURCE_BUCKET.to_string(),
            artifacts: ArtifactNamespace::new(ARTIFACT_BUCKET, OWNER),
            temp_dir: temp_root.path().to_path_buf(),
            max_sequence_probes: 20,
        };
        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            store.clone(),
            converter.clone(),
            repository.clone(),
            settings,
        ));

        Self {
            _db_dir: db_dir,
            _store_dir: store_dir,
            temp_root,
            store,
            repository,
            converter,
            pipeline,
        }
    }

    pub async fn add_source(&self, key: &str, data: &'static [u8]) {
        self.store.inner.put(SOURCE_BUCKET, key, Bytes::from_static(data)).await.unwrap();
    }

    pub async fn add_artifact(&self, key: &str) {
        self.store.inner.put(ARTIFACT_BUCKET, key, Bytes::from_static(b"COG")).await.unwrap();
    }

    pub async fn catalog(&self) -> Vec<ImageryRecord> {
        self.repository
            .search(&SearchCriteria::default(), &PageRequest::default())
            .await
            .unwrap()
            .content
    }

    /// Number of entries left under the temporary root.
    pub fn temp_entries(&self) -> usize {
        std::fs::read_dir(self.temp_root.path()).unwrap().count()
    }
}
