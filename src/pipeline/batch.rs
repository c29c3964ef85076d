use serde::Serialize;

use super::Pipeline;
use crate::catalog::ImageryRecord;
use crate::error::{ConvertError, FailureKind};

/// A key that failed to convert and why.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub key: String,
    pub kind: FailureKind,
    pub message: String,
}

impl FailedItem {
    fn new(key: &str, error: &ConvertError) -> Self {
        Self {
            key: key.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of a batch. `converted` keeps input order and omits failed keys.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub converted: Vec<ImageryRecord>,
    pub failed: Vec<FailedItem>,
}

impl Pipeline {
    /// Convert each key in turn. A failure is recorded and the batch moves on.
    pub async fn convert_many<S: AsRef<str>>(&self, keys: &[S]) -> BatchReport {
        let mut report = BatchReport::default();

        for key in keys {
            let key = key.as_ref();
            match self.convert_one(key).await {
                Ok(record) => report.converted.push(record),
                Err(e) => {
                    tracing::error!("Batch item {} failed ({:?}): {}", key, e.kind(), e);
                    report.failed.push(FailedItem::new(key, &e));
                }
            }
        }

        tracing::info!(
            "Batch finished: {} converted, {} failed",
            report.converted.len(),
            report.failed.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeConverter, Harness};

    #[tokio::test]
    async fn test_batch_skips_failures() {
        let harness = Harness::with_converter(FakeConverter::new().failing_on(&["b.tif"])).await;
        harness.add_source("in/a.tif", b"a").await;
        harness.add_source("in/b.tif", b"b").await;
        harness.add_source("in/c.tif", b"c").await;

        let report = harness
            .pipeline
            .convert_many(&["in/a.tif", "in/b.tif", "in/c.tif"])
            .await;

        let names: Vec<&str> = report.converted.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(names, vec!["in/a.tif", "in/c.tif"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "in/b.tif");
        assert_eq!(report.failed[0].kind, FailureKind::MetadataExtraction);
        assert_eq!(harness.catalog().await.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_duplicates_and_empty() {
        let harness = Harness::new().await;
        harness.add_source("in/a.tif", b"a").await;

        let report = harness.pipeline.convert_many(&["in/a.tif", "in/a.tif"]).await;
        let sequences: Vec<i32> = report.converted.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);

        let report = harness.pipeline.convert_many::<&str>(&[]).await;
        assert!(report.converted.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_report_json_shape() {
        let report = BatchReport {
            converted: Vec::new(),
            failed: vec![FailedItem {
                key: "in/b.tif".to_string(),
                kind: FailureKind::Upload,
                message: "boom".to_string(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "converted": [],
                "failed": [{"key": "in/b.tif", "kind": "upload", "message": "boom"}]
            })
        );
    }
}
