use serde::Serialize;

use crate::db::entities::imagery;

/// A catalog entry for one converted artifact. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageryRecord {
    pub id: i64,
    /// Full source object key
    pub original_name: String,
    pub base_name: String,
    /// `{base_name}_to_cog_{sequence}.tiff`
    pub cog_name: String,
    pub width: i32,
    pub height: i32,
    pub band_count: i32,
    pub projection: Option<String>,
    /// Stored object path, owner segment included
    pub storage_path: String,
    pub sequence: i32,
    pub file_size: i64,
    /// Unix seconds, assigned on save
    pub created_at: i64,
}

/// Everything the pipeline knows about an artifact before the catalog assigns identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImageryRecord {
    pub original_name: String,
    pub base_name: String,
    pub cog_name: String,
    pub width: i32,
    pub height: i32,
    pub band_count: i32,
    pub projection: Option<String>,
    pub storage_path: String,
    pub sequence: i32,
    pub file_size: i64,
}

impl From<imagery::Model> for ImageryRecord {
    fn from(model: imagery::Model) -> Self {
        Self {
            id: model.id,
            original_name: model.original_name,
            base_name: model.base_name,
            cog_name: model.cog_name,
            width: model.width,
            height: model.height,
            band_count: model.band_count,
            projection: model.projection,
            storage_path: model.storage_path,
            sequence: model.sequence,
            file_size: model.file_size,
            created_at: model.created_at,
        }
    }
}
