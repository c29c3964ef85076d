use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::conversion::ConversionError;
use crate::storage::StorageError;

/// Failure of a single conversion run. Each variant is fatal to the item it occurs in.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to fetch source object {key}: {source}")]
    SourceFetch {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Metadata extraction failed: {0}")]
    MetadataExtraction(ConversionError),

    #[error("COG conversion failed: {0}")]
    Conversion(ConversionError),

    #[error("Failed to probe artifact namespace for {key}: {source}")]
    SequenceProbe {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("No free sequence for {base_name} after {attempts} probes")]
    SequenceExhausted { base_name: String, attempts: u32 },

    #[error("Catalog lookup failed: {0}")]
    Catalog(#[source] sea_orm::DbErr),

    #[error("Temporary storage error: {0}")]
    TempStorage(#[from] std::io::Error),

    #[error("Failed to upload artifact {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to persist catalog record: {0}")]
    Persistence(#[source] sea_orm::DbErr),
}

/// Stable name of a failure class, used in batch reports and error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceFetch,
    MetadataExtraction,
    Conversion,
    SequenceProbe,
    SequenceExhausted,
    Catalog,
    TempStorage,
    Upload,
    Persistence,
}

impl ConvertError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::SourceFetch { .. } => FailureKind::SourceFetch,
            ConvertError::MetadataExtraction(_) => FailureKind::MetadataExtraction,
            ConvertError::Conversion(_) => FailureKind::Conversion,
            ConvertError::SequenceProbe { .. } => FailureKind::SequenceProbe,
            ConvertError::SequenceExhausted { .. } => FailureKind::SequenceExhausted,
            ConvertError::Catalog(_) => FailureKind::Catalog,
            ConvertError::TempStorage(_) => FailureKind::TempStorage,
            ConvertError::Upload { .. } => FailureKind::Upload,
            ConvertError::Persistence(_) => FailureKind::Persistence,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Conversion of {key} failed: {source}")]
    Convert {
        key: String,
        #[source]
        source: ConvertError,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error, kind) = match &self {
            ServerError::Convert { source, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Imagery conversion failed",
                Some(source.kind()),
            ),
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request", None),
            ServerError::Storage(StorageError::InvalidKey(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid request", None)
            }
            ServerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Storage error", None),
            ServerError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error", None),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = ErrorBody {
            error: error.to_string(),
            kind,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
