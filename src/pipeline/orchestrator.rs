//! Single-item conversion: source object in, cataloged COG artifact out.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use super::naming;
use super::sequence::SequenceAllocator;
use super::PipelineSettings;
use crate::catalog::{ImageryRecord, ImageryRepository, NewImageryRecord};
use crate::conversion::{ConversionError, ConversionService, RasterMetadata};
use crate::error::ConvertError;
use crate::storage::{StorageBackend, StorageError, StorageResult};

pub struct Pipeline {
    source: Arc<dyn StorageBackend>,
    destination: Arc<dyn StorageBackend>,
    converter: Arc<dyn ConversionService>,
    repository: Arc<dyn ImageryRepository>,
    allocator: SequenceAllocator,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn StorageBackend>,
        destination: Arc<dyn StorageBackend>,
        converter: Arc<dyn ConversionService>,
        repository: Arc<dyn ImageryRepository>,
        settings: PipelineSettings,
    ) -> Self {
        let allocator = SequenceAllocator::new(
            repository.clone(),
            destination.clone(),
            settings.artifacts.clone(),
            settings.max_sequence_probes,
        );
        Self {
            source,
            destination,
            converter,
            repository,
            allocator,
            settings,
        }
    }

    /// Source keys available for conversion, optionally under a prefix.
    pub async fn list_sources(&self, prefix: Option<&str>) -> StorageResult<Vec<String>> {
        self.source.list(&self.settings.source_bucket, prefix).await
    }

    /// Convert one source object and catalog the result.
    ///
    /// Both temporary directories are removed before this returns, whatever the outcome.
    /// A record is only written after the artifact is uploaded, so a failed run leaves
    /// the catalog untouched.
    pub async fn convert_one(&self, key: &str) -> Result<ImageryRecord, ConvertError> {
        tracing::info!("Converting {}", key);

        let download_dir = self.scratch_dir("download-").await?;
        let converted_dir = match self.scratch_dir("converted-").await {
            Ok(dir) => dir,
            Err(e) => {
                release(download_dir);
                return Err(e);
            }
        };

        let result = self.run(key, download_dir.path(), converted_dir.path()).await;

        release(download_dir);
        release(converted_dir);

        match &result {
            Ok(record) => tracing::info!(
                "Converted {} to {} (sequence {}, {} bytes)",
                key,
                record.storage_path,
                record.sequence,
                record.file_size
            ),
            Err(e) => tracing::error!("Conversion of {} failed: {}", key, e),
        }
        result
    }

    async fn run(&self, key: &str, download_dir: &Path, converted_dir: &Path) -> Result<ImageryRecord, ConvertError> {
        let file_name = naming::file_name(key);
        let base_name = naming::base_name(key);
        if base_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(ConvertError::SourceFetch {
                key: key.to_string(),
                source: StorageError::InvalidKey(key.to_string()),
            });
        }

        // Fetch
        let download_path = download_dir.join(file_name);
        self.source
            .get_to_file(&self.settings.source_bucket, key, &download_path)
            .await
            .map_err(|source| ConvertError::SourceFetch {
                key: key.to_string(),
                source,
            })?;
        let raw = Bytes::from(tokio::fs::read(&download_path).await?);
        tracing::debug!("Downloaded {} ({} bytes)", key, raw.len());

        // Inspect and convert
        let metadata = self
            .converter
            .extract_metadata(file_name, raw.clone())
            .await
            .map_err(ConvertError::MetadataExtraction)?;
        validate_metadata(&metadata).map_err(ConvertError::MetadataExtraction)?;
        tracing::debug!(
            "{}: {}x{}, {} bands",
            file_name,
            metadata.width,
            metadata.height,
            metadata.band_count
        );

        let cog = self
            .converter
            .convert_to_cog(file_name, raw)
            .await
            .map_err(ConvertError::Conversion)?;

        // Name and upload; the reservation is held until the record is saved
        let reservation = self.allocator.reserve(base_name).await?;
        let cog_name = naming::cog_name(base_name, reservation.sequence);

        let cog_path = converted_dir.join(&cog_name);
        tokio::fs::write(&cog_path, &cog).await?;
        let file_size = tokio::fs::metadata(&cog_path).await?.len() as i64;

        let object_key = self.settings.artifacts.object_key(&cog_name);
        let storage_path = self
            .destination
            .put_from_file(&self.settings.artifacts.bucket, &object_key, &cog_path)
            .await
            .map_err(|source| ConvertError::Upload {
                key: object_key.clone(),
                source,
            })?;

        let record = self
            .repository
            .save(NewImageryRecord {
                original_name: key.to_string(),
                base_name: base_name.to_string(),
                cog_name,
                width: metadata.width,
                height: metadata.height,
                band_count: metadata.band_count,
                projection: metadata.projection,
                storage_path,
                sequence: reservation.sequence,
                file_size,
            })
            .await
            .map_err(ConvertError::Persistence)?;

        drop(reservation);
        Ok(record)
    }

    async fn scratch_dir(&self, prefix: &str) -> Result<TempDir, ConvertError> {
        tokio::fs::create_dir_all(&self.settings.temp_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.settings.temp_dir)?;
        Ok(dir)
    }
}

fn validate_metadata(metadata: &RasterMetadata) -> Result<(), ConversionError> {
    if metadata.width <= 0 || metadata.height <= 0 || metadata.band_count <= 0 {
        return Err(ConversionError::InvalidResponse {
            operation: "extractMetadata",
            message: format!(
                "non-positive dimensions {}x{} with {} bands",
                metadata.width, metadata.height, metadata.band_count
            ),
        });
    }
    Ok(())
}

fn release(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        tracing::warn!("Failed to remove temporary directory {}: {}", path.display(), e);
    }
}
