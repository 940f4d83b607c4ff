use crate::registry::blob_store::{BlobEnumerator, BlobStore, Error};
use crate::registry::data_store::{self, DataStore};
use crate::registry::oci::Digest;
use crate::registry::path_builder;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Blob store over the distribution storage layout.
#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn DataStore>,
}

impl Debug for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStoreBackend").finish()
    }
}

impl Backend {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

/// Walk state of a blob enumeration: every directory is listed at most once.
struct BlobWalk {
    store: Arc<dyn DataStore>,
    prefixes: Option<VecDeque<String>>,
    hashes: VecDeque<String>,
}

impl BlobWalk {
    fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            prefixes: None,
            hashes: VecDeque::new(),
        }
    }

    async fn next_digest(&mut self) -> Result<Option<Digest>, Error> {
        if self.prefixes.is_none() {
            let root = path_builder::blobs_root_dir("sha256");
            let prefixes = self.store.list_dir(&root).await?;
            debug!("Found {} blob prefixes", prefixes.len());
            self.prefixes = Some(prefixes.into());
        }

        loop {
            while let Some(hash) = self.hashes.pop_front() {
                match Digest::try_from(format!("sha256:{hash}").as_str()) {
                    Ok(digest) => return Ok(Some(digest)),
                    Err(_) => warn!("Ignoring unexpected blob store entry: '{hash}'"),
                }
            }

            let Some(prefix) = self.prefixes.as_mut().and_then(VecDeque::pop_front) else {
                return Ok(None);
            };
            if prefix.len() != 2 || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
                warn!("Ignoring unexpected blob prefix entry: '{prefix}'");
                continue;
            }

            let prefix_dir = path_builder::blobs_prefix_dir("sha256", &prefix);
            match self.store.list_dir(&prefix_dir).await {
                Ok(hashes) => self.hashes = hashes.into(),
                // prefix directory removed since the root was listed
                Err(data_store::Error::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl BlobStore for Backend {
    #[instrument(skip(self))]
    async fn get_blob_size(&self, digest: &Digest) -> Result<u64, Error> {
        let path = path_builder::blob_path(digest);
        match self.store.file_size(&path).await {
            Ok(size) => Ok(size),
            Err(data_store::Error::NotFound(_)) => Err(Error::BlobNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

impl BlobEnumerator for Backend {
    fn list_blobs(&self) -> BoxStream<'static, Result<Digest, Error>> {
        let walk = BlobWalk::new(self.store.clone());

        stream::try_unfold(walk, |mut walk| async move {
            let digest = walk.next_digest().await?;
            Ok::<_, Error>(digest.map(|digest| (digest, walk)))
        })
        .boxed()
    }
}
