use std::sync::Arc;

use serde::Deserialize;

use crate::registry::data_store;
use crate::registry::metadata_store::{Backend, Error, MetadataStore};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum MetadataStoreConfig {
    #[serde(rename = "fs")]
    FS(data_store::fs::BackendConfig),
    #[serde(rename = "s3")]
    S3(data_store::s3::BackendConfig),
    #[serde(skip_deserializing)]
    #[default]
    Unspecified,
}

impl MetadataStoreConfig {
    pub fn to_backend(&self) -> Result<Arc<dyn MetadataStore>, Error> {
        let store: Arc<dyn data_store::DataStore> = match self {
            MetadataStoreConfig::FS(config) => Arc::new(data_store::fs::Backend::new(config)),
            MetadataStoreConfig::S3(config) => Arc::new(data_store::s3::Backend::new(config)?),
            MetadataStoreConfig::Unspecified => {
                return Err(Error::Configuration(
                    "Metadata store is not configured".to_string(),
                ))
            }
        };

        Ok(Arc::new(Backend::new(store)))
    }
}
