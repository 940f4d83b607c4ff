use std::sync::Arc;

use serde::Deserialize;

use crate::registry::blob_store::{Backend, BlobStoreHandle, Error};
use crate::registry::data_store;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum BlobStorageConfig {
    #[serde(rename = "fs")]
    FS(data_store::fs::BackendConfig),
    #[serde(rename = "s3")]
    S3(data_store::s3::BackendConfig),
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        BlobStorageConfig::FS(data_store::fs::BackendConfig::default())
    }
}

impl BlobStorageConfig {
    pub fn to_data_store(&self) -> Result<Arc<dyn data_store::DataStore>, Error> {
        match self {
            BlobStorageConfig::FS(config) => Ok(Arc::new(data_store::fs::Backend::new(config))),
            BlobStorageConfig::S3(config) => Ok(Arc::new(data_store::s3::Backend::new(config)?)),
        }
    }

    /// Both supported drivers can list their content, so the handle is always
    /// enumerable.
    pub fn to_handle(&self) -> Result<BlobStoreHandle, Error> {
        let store = Backend::new(self.to_data_store()?);
        Ok(BlobStoreHandle::Enumerable(Arc::new(store)))
    }
}
