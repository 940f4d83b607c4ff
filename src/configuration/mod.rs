use serde::Deserialize;
use std::fs;
use std::path::Path;

mod error;

use crate::registry::blob_store::BlobStorageConfig;
use crate::registry::metadata_store::MetadataStoreConfig;
use crate::registry::stats::ExpansionMode;
pub use error::Error;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default, alias = "storage")]
    pub blob_store: BlobStorageConfig,
    #[serde(default)]
    pub metadata_store: MetadataStoreConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StatsConfig {
    /// Number of entries requested per enumeration call.
    #[serde(default = "StatsConfig::default_page_size")]
    pub page_size: u16,
    /// Follow manifest lists down to their leaves when marking.
    #[serde(default)]
    pub expand_manifest_lists: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            page_size: StatsConfig::default_page_size(),
            expand_manifest_lists: false,
        }
    }
}

impl StatsConfig {
    fn default_page_size() -> u16 {
        1000
    }

    pub fn expansion_mode(&self) -> ExpansionMode {
        if self.expand_manifest_lists {
            ExpansionMode::Recursive
        } else {
            ExpansionMode::SingleLevel
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let mut config: Configuration = toml::from_str(slice)?;

        // Resolve Unspecified metadata_store based on blob_store configuration
        if matches!(config.metadata_store, MetadataStoreConfig::Unspecified) {
            config.metadata_store = match &config.blob_store {
                BlobStorageConfig::FS(cfg) => MetadataStoreConfig::FS(cfg.clone()),
                BlobStorageConfig::S3(cfg) => {
                    tracing::info!("Auto-configuring S3 metadata-store from blob-store");
                    MetadataStoreConfig::S3(cfg.clone())
                }
            };
        }

        if config.stats.page_size == 0 {
            return Err(Error::InvalidValue(
                "stats.page_size must be greater than 0".to_string(),
            ));
        }

        Ok(config)
    }
}
