//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::{ArtifactNamespace, PipelineSettings};
use crate::storage::{S3Config, StaticCredentials, StorageConfig, StorageError};

const DEFAULT_CONVERSION_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SOURCE_BUCKET: &str = "scenes";
const DEFAULT_ARTIFACT_BUCKET: &str = "artifacts";
const DEFAULT_ARTIFACT_OWNER: &str = "default";
const DEFAULT_MAX_SEQUENCE_PROBES: u32 = 1000;
const DEFAULT_S3_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to load credentials file: {0}")]
    Credentials(#[source] StorageError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// Holds the catalog database and, for local storage, the object tree
    pub data_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub conversion_url: String,
    pub conversion_timeout: Duration,
    pub source_bucket: String,
    pub artifacts: ArtifactNamespace,
    pub max_sequence_probes: u32,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = var("COG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("cog-catalog"));
        let temp_dir = var("COG_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("cog-converter"));

        let credentials = match var("COG_AWS_CREDENTIALS_PATH") {
            Some(path) => Some(
                StaticCredentials::from_file(&PathBuf::from(path)).map_err(ConfigError::Credentials)?,
            ),
            None => None,
        };

        // The credentials file may name the artifact bucket and owner
        let artifact_bucket = var("COG_ARTIFACT_BUCKET")
            .or_else(|| credentials.as_ref().and_then(|c| c.bucket_name.clone()))
            .unwrap_or_else(|| DEFAULT_ARTIFACT_BUCKET.to_string());
        let artifact_owner = var("COG_ARTIFACT_OWNER")
            .or_else(|| credentials.as_ref().and_then(|c| c.username.clone()))
            .unwrap_or_else(|| DEFAULT_ARTIFACT_OWNER.to_string());

        let storage = match var("COG_STORAGE").as_deref() {
            None | Some("local") => StorageConfig::local(data_dir.join("objects")),
            Some("s3") => {
                let mut config = match var("COG_S3_ENDPOINT") {
                    Some(endpoint) => S3Config::minio(endpoint),
                    None => S3Config::aws(
                        var("COG_S3_REGION")
                            .or_else(|| credentials.as_ref().map(|c| c.region.clone()))
                            .unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
                    ),
                };
                if let Some(region) = var("COG_S3_REGION") {
                    config.region = region;
                }
                if let Some(prefix) = var("COG_S3_PREFIX") {
                    config = config.with_prefix(prefix);
                }
                StorageConfig::s3(config, credentials)
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "COG_STORAGE",
                    value: other.to_string(),
                    reason: "expected \"local\" or \"s3\"".to_string(),
                })
            }
        };

        let max_sequence_probes: u32 =
            parse_or(&var, "COG_MAX_SEQUENCE_PROBES", DEFAULT_MAX_SEQUENCE_PROBES)?;
        if max_sequence_probes == 0 {
            return Err(ConfigError::Invalid {
                var: "COG_MAX_SEQUENCE_PROBES",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            listen_addr: parse_or(&var, "COG_LISTEN_ADDR", SocketAddr::from(([127, 0, 0, 1], 8080)))?,
            data_dir,
            temp_dir,
            conversion_url: var("COG_CONVERSION_URL").unwrap_or_else(|| DEFAULT_CONVERSION_URL.to_string()),
            conversion_timeout: Duration::from_secs(parse_or(
                &var,
                "COG_CONVERSION_TIMEOUT_SECS",
                DEFAULT_CONVERSION_TIMEOUT_SECS,
            )?),
            source_bucket: var("COG_SOURCE_BUCKET").unwrap_or_else(|| DEFAULT_SOURCE_BUCKET.to_string()),
            artifacts: ArtifactNamespace::new(artifact_bucket, artifact_owner),
            max_sequence_probes,
            storage,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            source_bucket: self.source_bucket.clone(),
            artifacts: self.artifacts.clone(),
            temp_dir: self.temp_dir.clone(),
            max_sequence_probes: self.max_sequence_probes,
        }
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageType;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.data_dir, std::env::temp_dir().join("cog-catalog"));
        assert_eq!(config.database_path(), std::env::temp_dir().join("cog-catalog").join("catalog.db"));
        assert_eq!(config.temp_dir, std::env::temp_dir().join("cog-converter"));
        assert_eq!(config.conversion_url, "http://127.0.0.1:5000");
        assert_eq!(config.conversion_timeout, Duration::from_secs(300));
        assert_eq!(config.source_bucket, "scenes");
        assert_eq!(config.artifacts, ArtifactNamespace::new("artifacts", "default"));
        assert_eq!(config.max_sequence_probes, 1000);
        assert!(matches!(
            config.storage.storage_type,
            StorageType::Local { ref path } if path == &std::env::temp_dir().join("cog-catalog").join("objects")
        ));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("COG_LISTEN_ADDR", "0.0.0.0:9000"),
            ("COG_DATA_DIR", "/srv/cog"),
            ("COG_CONVERSION_URL", "http://gdal:5000"),
            ("COG_CONVERSION_TIMEOUT_SECS", "30"),
            ("COG_ARTIFACT_OWNER", "alice"),
            ("COG_MAX_SEQUENCE_PROBES", "5"),
            ("COG_SOURCE_BUCKET", " "),
        ])
        .unwrap();

        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.database_path(), PathBuf::from("/srv/cog/catalog.db"));
        assert_eq!(config.conversion_url, "http://gdal:5000");
        assert_eq!(config.conversion_timeout, Duration::from_secs(30));
        assert_eq!(config.artifacts.owner, "alice");
        assert_eq!(config.max_sequence_probes, 5);
        // Blank means unset
        assert_eq!(config.source_bucket, "scenes");

        let settings = config.pipeline_settings();
        assert_eq!(settings.artifacts.object_key("x.tiff"), "alice/x.tiff");
        assert_eq!(settings.max_sequence_probes, 5);
    }

    #[test]
    fn test_malformed_values() {
        assert!(matches!(
            config_from(&[("COG_CONVERSION_TIMEOUT_SECS", "five")]),
            Err(ConfigError::Invalid { var: "COG_CONVERSION_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[("COG_LISTEN_ADDR", "localhost")]),
            Err(ConfigError::Invalid { var: "COG_LISTEN_ADDR", .. })
        ));
        assert!(matches!(
            config_from(&[("COG_MAX_SEQUENCE_PROBES", "0")]),
            Err(ConfigError::Invalid { var: "COG_MAX_SEQUENCE_PROBES", .. })
        ));
        assert!(matches!(
            config_from(&[("COG_STORAGE", "ftp")]),
            Err(ConfigError::Invalid { var: "COG_STORAGE", .. })
        ));
    }

    #[test]
    fn test_s3_with_credentials_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aws.json");
        std::fs::write(
            &path,
            r#"{"access_key_id":"AKIA","secret_access_key":"s","region":"ap-northeast-2","bucket_name":"converted","username":"bob"}"#,
        )
        .unwrap();
        let path = path.to_string_lossy().to_string();

        let config = config_from(&[
            ("COG_STORAGE", "s3"),
            ("COG_AWS_CREDENTIALS_PATH", &path),
            ("COG_S3_PREFIX", "staging/"),
        ])
        .unwrap();

        assert_eq!(config.artifacts, ArtifactNamespace::new("converted", "bob"));
        match config.storage.storage_type {
            StorageType::S3 { config, credentials } => {
                assert_eq!(config.region, "ap-northeast-2");
                assert_eq!(config.prefix.as_deref(), Some("staging/"));
                assert!(config.endpoint.is_none());
                assert_eq!(credentials.unwrap().access_key_id, "AKIA");
            }
            other => panic!("expected S3 storage, got {:?}", other),
        }

        // Explicit variables win over the file
        let config = config_from(&[
            ("COG_AWS_CREDENTIALS_PATH", &path),
            ("COG_ARTIFACT_BUCKET", "other"),
        ])
        .unwrap();
        assert_eq!(config.artifacts, ArtifactNamespace::new("other", "bob"));
    }

    #[test]
    fn test_s3_endpoint() {
        let config = config_from(&[
            ("COG_STORAGE", "s3"),
            ("COG_S3_ENDPOINT", "http://minio:9000"),
        ])
        .unwrap();
        match config.storage.storage_type {
            StorageType::S3 { config, credentials } => {
                assert_eq!(config.endpoint.as_deref(), Some("http://minio:9000"));
                assert!(config.force_path_style);
                assert!(credentials.is_none());
            }
            other => panic!("expected S3 storage, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_credentials_file() {
        assert!(matches!(
            config_from(&[("COG_AWS_CREDENTIALS_PATH", "/nonexistent/aws.json")]),
            Err(ConfigError::Credentials(_))
        ));
    }
}
