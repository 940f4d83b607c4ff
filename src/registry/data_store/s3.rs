use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{timeout::TimeoutConfig, BehaviorVersion, Credentials, Region};
use aws_sdk_s3::{Client as S3Client, Config as S3Config};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::registry::data_store::{DataStore, Error};

const LIST_MAX_KEYS: i32 = 1000;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub access_key_id: String,
    pub secret_key: String,
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub key_prefix: String,
    pub operation_timeout_secs: u64,
    pub operation_attempt_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_key: String::new(),
            endpoint: String::new(),
            bucket: String::new(),
            region: String::new(),
            key_prefix: String::new(),
            operation_timeout_secs: 900,
            operation_attempt_timeout_secs: 300,
            max_attempts: 3,
        }
    }
}

#[derive(Clone)]
pub struct Backend {
    s3_client: S3Client,
    bucket: String,
    key_prefix: String,
}

impl Backend {
    pub fn new(config: &BackendConfig) -> Result<Self, Error> {
        if config.bucket.is_empty() {
            return Err(Error::Configuration(
                "S3 bucket name must not be empty".to_string(),
            ));
        }

        info!("Using S3 data-store backend (bucket '{}')", config.bucket);

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_key,
            None,
            None,
            "custom",
        );

        let timeout = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.operation_timeout_secs))
            .operation_attempt_timeout(Duration::from_secs(config.operation_attempt_timeout_secs))
            .build();

        let retry = RetryConfig::standard().with_max_attempts(config.max_attempts);

        let client_config = S3Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .timeout_config(timeout)
            .retry_config(retry)
            .force_path_style(true)
            .build();

        let s3_client = S3Client::from_conf(client_config);

        Ok(Self {
            s3_client,
            bucket: config.bucket.clone(),
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn full_key(&self, path: &str) -> String {
        full_key(&self.key_prefix, path)
    }
}

fn full_key(key_prefix: &str, path: &str) -> String {
    if key_prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", key_prefix.trim_end_matches('/'), path)
    }
}

fn directory_prefix(key: String) -> String {
    if key.is_empty() || key.ends_with('/') {
        key
    } else {
        format!("{key}/")
    }
}

fn child_name<'a>(full_prefix: &str, key: &'a str) -> Option<&'a str> {
    let name = key.strip_prefix(full_prefix)?.trim_end_matches('/');
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[async_trait]
impl DataStore for Backend {
    #[instrument(skip(self))]
    async fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        let key = self.full_key(path);

        let result = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Error::NotFound(path.to_string())
                } else {
                    Error::Io(service_error.to_string())
                }
            })?;

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }

    #[instrument(skip(self))]
    async fn list_dir(&self, path: &str) -> Result<Vec<String>, Error> {
        let full_prefix = directory_prefix(self.full_key(path));
        let mut entries = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .s3_client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .delimiter("/")
                .max_keys(LIST_MAX_KEYS)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| Error::Io(e.to_string()))?;

            for prefix in res.common_prefixes.unwrap_or_default() {
                let name = prefix
                    .prefix
                    .as_deref()
                    .and_then(|p| child_name(&full_prefix, p));
                if let Some(name) = name {
                    entries.push(name.to_string());
                }
            }

            for object in res.contents.unwrap_or_default() {
                let name = object
                    .key
                    .as_deref()
                    .and_then(|k| child_name(&full_prefix, k));
                if let Some(name) = name {
                    entries.push(name.to_string());
                }
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        // S3 has no directories: an empty listing means the path does not exist
        if entries.is_empty() {
            return Err(Error::NotFound(path.to_string()));
        }

        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn file_size(&self, path: &str) -> Result<u64, Error> {
        let key = self.full_key(path);

        let result = self
            .s3_client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Error::NotFound(path.to_string())
                } else {
                    Error::Io(service_error.to_string())
                }
            })?;

        let size = result.content_length.unwrap_or_default();
        u64::try_from(size).map_err(|e| Error::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key() {
        assert_eq!(full_key("", "v2/blobs"), "v2/blobs");
        assert_eq!(full_key("prefix", "v2/blobs"), "prefix/v2/blobs");
        assert_eq!(full_key("prefix/", "v2/blobs"), "prefix/v2/blobs");
    }

    #[test]
    fn test_directory_prefix() {
        assert_eq!(directory_prefix(String::new()), "");
        assert_eq!(directory_prefix("a/b".to_string()), "a/b/");
        assert_eq!(directory_prefix("a/b/".to_string()), "a/b/");
    }

    #[test]
    fn test_child_name() {
        assert_eq!(child_name("a/b/", "a/b/c/"), Some("c"));
        assert_eq!(child_name("a/b/", "a/b/data"), Some("data"));
        assert_eq!(child_name("a/b/", "a/b/"), None);
        assert_eq!(child_name("a/b/", "x/y"), None);
    }

    #[test]
    fn test_new_requires_bucket() {
        let config = BackendConfig::default();
        assert!(matches!(
            Backend::new(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config: BackendConfig = toml::from_str(
            r#"
            bucket = "registry"
            region = "us-east-1"
            endpoint = "http://127.0.0.1:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.bucket, "registry");
        assert_eq!(config.key_prefix, "");
        assert_eq!(config.operation_timeout_secs, 900);
        assert_eq!(config.max_attempts, 3);
    }
}
