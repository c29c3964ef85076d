//! Conversion pipeline: download, extract, convert, name, upload, catalog.

mod batch;
pub mod naming;
mod orchestrator;
mod sequence;
#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchReport, FailedItem};
pub use orchestrator::Pipeline;
pub use sequence::{SequenceAllocator, SequenceReservation};

use std::path::PathBuf;

/// Where converted artifacts live: a bucket plus the owning user's key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNamespace {
    pub bucket: String,
    pub owner: String,
}

impl ArtifactNamespace {
    pub fn new(bucket: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            owner: owner.into(),
        }
    }

    /// Object key of an artifact inside the bucket.
    pub fn object_key(&self, artifact_name: &str) -> String {
        if self.owner.is_empty() {
            artifact_name.to_string()
        } else {
            format!("{}/{}", self.owner, artifact_name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bucket holding the raw imagery
    pub source_bucket: String,
    pub artifacts: ArtifactNamespace,
    /// Root under which per-run temporary directories are created
    pub temp_dir: PathBuf,
    pub max_sequence_probes: u32,
}
