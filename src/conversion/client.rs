//! HTTP client for the conversion service (`/extractMetadata`, `/convertToCog`, `/health`).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::time::Duration;

use super::{ConversionError, ConversionService, RasterMetadata};

const EXTRACT_METADATA: &str = "extractMetadata";
const CONVERT_TO_COG: &str = "convertToCog";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpConversionClient {
    client: Client,
    base_url: String,
}

impl HttpConversionClient {
    /// `timeout` bounds each whole request, upload and conversion included.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConversionError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| ConversionError::Request {
                operation: "client setup",
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_file(
        &self,
        operation: &'static str,
        file_name: &str,
        data: Bytes,
    ) -> Result<Response, ConversionError> {
        let len = data.len() as u64;
        let part = Part::stream_with_length(data, len)
            .file_name(file_name.to_string())
            .mime_str("image/tiff")
            .map_err(|source| ConversionError::Request { operation, source })?;
        let form = Form::new().part("file", part);

        tracing::debug!("POST {}/{} file={} size={}", self.base_url, operation, file_name, len);

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, operation))
            .multipart(form)
            .send()
            .await
            .map_err(|source| ConversionError::Request { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("{} failed: status={} body={}", operation, status, body);
            return Err(ConversionError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ConversionService for HttpConversionClient {
    async fn extract_metadata(&self, file_name: &str, data: Bytes) -> Result<RasterMetadata, ConversionError> {
        let response = self.post_file(EXTRACT_METADATA, file_name, data).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| ConversionError::Request {
                operation: EXTRACT_METADATA,
                source,
            })?;

        serde_json::from_slice(&body).map_err(|e| ConversionError::InvalidResponse {
            operation: EXTRACT_METADATA,
            message: e.to_string(),
        })
    }

    async fn convert_to_cog(&self, file_name: &str, data: Bytes) -> Result<Bytes, ConversionError> {
        let response = self.post_file(CONVERT_TO_COG, file_name, data).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| ConversionError::Request {
                operation: CONVERT_TO_COG,
                source,
            })?;

        if body.is_empty() {
            return Err(ConversionError::InvalidResponse {
                operation: CONVERT_TO_COG,
                message: "empty payload".to_string(),
            });
        }
        Ok(body)
    }

    async fn health(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Conversion service health check failed: {}", e);
                false
            }
        }
    }
}
