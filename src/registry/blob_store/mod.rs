mod backend;
mod config;
mod error;

use crate::registry::oci::Digest;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

pub use backend::Backend;
pub use config::BlobStorageConfig;
pub use error::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_blob_size(&self, digest: &Digest) -> Result<u64, Error>;
}

/// Single pass over the whole blob population.
///
/// A store without any blob yet yields `Error::PathNotFound`. The stream ends
/// after the first error.
#[cfg_attr(test, mockall::automock)]
pub trait BlobEnumerator: Send + Sync {
    fn list_blobs(&self) -> BoxStream<'static, Result<Digest, Error>>;
}

pub trait EnumerableBlobStore: BlobStore + BlobEnumerator {}
impl<T> EnumerableBlobStore for T where T: BlobStore + BlobEnumerator {}

/// A blob store, together with what it is able to do, resolved once when built.
#[derive(Clone)]
pub enum BlobStoreHandle {
    Enumerable(Arc<dyn EnumerableBlobStore>),
    NotEnumerable(Arc<dyn BlobStore>),
}

impl BlobStoreHandle {
    pub fn enumerator(&self) -> Option<&dyn EnumerableBlobStore> {
        match self {
            BlobStoreHandle::Enumerable(store) => Some(store.as_ref()),
            BlobStoreHandle::NotEnumerable(_) => None,
        }
    }

    pub async fn get_blob_size(&self, digest: &Digest) -> Result<u64, Error> {
        match self {
            BlobStoreHandle::Enumerable(store) => store.get_blob_size(digest).await,
            BlobStoreHandle::NotEnumerable(store) => store.get_blob_size(digest).await,
        }
    }
}
