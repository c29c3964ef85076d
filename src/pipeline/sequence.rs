//! Collision-free sequence allocation for artifact names.
//!
//! The catalog's maximum sequence is only a starting point: artifacts can land in the bucket
//! without a catalog row, so every candidate is probed against the bucket itself and the
//! first free slot wins. Allocation for one base name is serialized in-process, and the
//! reservation stays locked until the caller has uploaded and cataloged the artifact.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::naming::cog_name;
use super::ArtifactNamespace;
use crate::catalog::ImageryRepository;
use crate::error::ConvertError;
use crate::storage::StorageBackend;

pub struct SequenceAllocator {
    repository: Arc<dyn ImageryRepository>,
    store: Arc<dyn StorageBackend>,
    namespace: ArtifactNamespace,
    max_probes: u32,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// An allocated sequence, exclusive for its base name until dropped.
pub struct SequenceReservation {
    pub sequence: i32,
    _guard: OwnedMutexGuard<()>,
}

impl SequenceAllocator {
    pub fn new(
        repository: Arc<dyn ImageryRepository>,
        store: Arc<dyn StorageBackend>,
        namespace: ArtifactNamespace,
        max_probes: u32,
    ) -> Self {
        Self {
            repository,
            store,
            namespace,
            max_probes: max_probes.max(1),
            locks: DashMap::new(),
        }
    }

    /// Lock the base name, then allocate. Holds off other reservations for the same name.
    pub async fn reserve(&self, base_name: &str) -> Result<SequenceReservation, ConvertError> {
        let lock = self
            .locks
            .entry(base_name.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;

        let sequence = self.next_sequence(base_name).await?;
        Ok(SequenceReservation {
            sequence,
            _guard: guard,
        })
    }

    /// Next sequence number whose artifact name is free in the bucket.
    pub async fn next_sequence(&self, base_name: &str) -> Result<i32, ConvertError> {
        let exhausted = || ConvertError::SequenceExhausted {
            base_name: base_name.to_string(),
            attempts: self.max_probes,
        };

        let recorded = self
            .repository
            .max_sequence(base_name)
            .await
            .map_err(ConvertError::Catalog)?;
        let mut candidate = match recorded {
            Some(max) => max.checked_add(1).ok_or_else(exhausted)?,
            None => 1,
        };

        for _ in 0..self.max_probes {
            let key = self.namespace.object_key(&cog_name(base_name, candidate));
            let taken = self
                .store
                .exists(&self.namespace.bucket, &key)
                .await
                .map_err(|source| ConvertError::SequenceProbe {
                    key: key.clone(),
                    source,
                })?;

            if !taken {
                tracing::debug!("Allocated sequence {} for {}", candidate, base_name);
                return Ok(candidate);
            }

            tracing::info!("{} already exists in {}, trying next sequence", key, self.namespace.bucket);
            candidate = candidate.checked_add(1).ok_or_else(exhausted)?;
        }

        tracing::error!("Gave up allocating a sequence for {} after {} probes", base_name, self.max_probes);
        Err(exhausted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::catalog::{test_repository, NewImageryRecord, SqlImageryRepository};
    use crate::storage::LocalStorage;

    struct Fixture {
        _db_dir: TempDir,
        _store_dir: TempDir,
        repository: Arc<SqlImageryRepository>,
        store: Arc<LocalStorage>,
    }

    impl Fixture {
        async fn new() -> Self {
            let (db_dir, repository) = test_repository().await;
            let store_dir = TempDir::new().unwrap();
            Self {
                _db_dir: db_dir,
                store: Arc::new(LocalStorage::new(store_dir.path().to_path_buf())),
                _store_dir: store_dir,
                repository: Arc::new(repository),
            }
        }

        fn allocator(&self, max_probes: u32) -> SequenceAllocator {
            SequenceAllocator::new(
                self.repository.clone(),
                self.store.clone(),
                ArtifactNamespace::new("artifacts", "alice"),
                max_probes,
            )
        }

        async fn record(&self, base_name: &str, sequence: i32) {
            let cog = cog_name(base_name, sequence);
            self.repository
                .save(NewImageryRecord {
                    original_name: format!("scenes/{}.tif", base_name),
                    base_name: base_name.to_string(),
                    storage_path: format!("alice/{}", cog),
                    cog_name: cog,
                    width: 1,
                    height: 1,
                    band_count: 1,
                    projection: None,
                    sequence,
                    file_size: 1,
                })
                .await
                .unwrap();
        }

        async fn occupy(&self, key: &str) {
            self.store.put("artifacts", key, Bytes::from("cog")).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_first_sequence_is_one() {
        let fixture = Fixture::new().await;
        assert_eq!(fixture.allocator(10).next_sequence("scene_001").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_follows_recorded_maximum() {
        let fixture = Fixture::new().await;
        fixture.record("scene_001", 1).await;
        fixture.record("scene_001", 3).await;
        fixture.record("scene_002", 7).await;

        let allocator = fixture.allocator(10);
        assert_eq!(allocator.next_sequence("scene_001").await.unwrap(), 4);
        assert_eq!(allocator.next_sequence("scene_002").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_skips_artifacts_present_in_bucket() {
        let fixture = Fixture::new().await;
        fixture.record("scene_001", 2).await;
        fixture.occupy("alice/scene_001_to_cog_3.tiff").await;
        fixture.occupy("alice/scene_001_to_cog_4.tiff").await;
        // Gaps below the candidate are never reused
        fixture.occupy("alice/scene_001_to_cog_6.tiff").await;

        assert_eq!(fixture.allocator(10).next_sequence("scene_001").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_only_owner_prefix_counts() {
        let fixture = Fixture::new().await;
        fixture.occupy("bob/scene_001_to_cog_1.tiff").await;
        fixture.occupy("scene_001_to_cog_1.tiff").await;

        assert_eq!(fixture.allocator(10).next_sequence("scene_001").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_probe_bound() {
        let fixture = Fixture::new().await;
        for sequence in 1..=3 {
            fixture.occupy(&format!("alice/scene_to_cog_{}.tiff", sequence)).await;
        }

        let err = fixture.allocator(3).next_sequence("scene").await.unwrap_err();
        assert!(matches!(
            err,
            ConvertError::SequenceExhausted { attempts: 3, .. }
        ));

        assert_eq!(fixture.allocator(4).next_sequence("scene").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_reservation_serializes_same_base_name() {
        let fixture = Fixture::new().await;
        let allocator = fixture.allocator(10);

        let first = allocator.reserve("scene").await.unwrap();
        assert_eq!(first.sequence, 1);

        // A different base name is not blocked
        let other = tokio::time::timeout(Duration::from_millis(500), allocator.reserve("other"))
            .await
            .expect("other base name should not wait")
            .unwrap();
        assert_eq!(other.sequence, 1);

        // The same base name waits for the first reservation
        let blocked = tokio::time::timeout(Duration::from_millis(100), allocator.reserve("scene")).await;
        assert!(blocked.is_err());

        // Simulate the upload that happens while the first reservation is held
        fixture.occupy("alice/scene_to_cog_1.tiff").await;
        drop(first);

        let second = tokio::time::timeout(Duration::from_millis(500), allocator.reserve("scene"))
            .await
            .expect("lock should be released")
            .unwrap();
        assert_eq!(second.sequence, 2);
    }
}
