//! Client side of the external GDAL conversion service.
//!
//! The service does the heavy lifting: it reads raster metadata and rewrites a raster as a
//! Cloud Optimized GeoTIFF. This side only ships bytes to it and interprets the answers.

mod client;

pub use client::HttpConversionClient;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

/// Raster metadata reported by the conversion service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterMetadata {
    pub width: i32,
    pub height: i32,
    pub band_count: i32,
    /// WKT of the coordinate system; the service sends "" when there is none
    #[serde(default, deserialize_with = "empty_as_none")]
    pub projection: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("{operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} returned an invalid response: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

/// Remote operations the pipeline needs from the conversion service.
///
/// `file_name` is forwarded as the multipart file name so the service can name its
/// temporaries after the source.
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn extract_metadata(&self, file_name: &str, data: Bytes) -> Result<RasterMetadata, ConversionError>;

    async fn convert_to_cog(&self, file_name: &str, data: Bytes) -> Result<Bytes, ConversionError>;

    /// Whether the service currently answers its health endpoint.
    async fn health(&self) -> bool;
}
