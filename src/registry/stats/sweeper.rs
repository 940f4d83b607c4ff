use crate::registry::blob_store::{self, EnumerableBlobStore};
use crate::registry::oci::Digest;
use crate::registry::stats::{Error, LiveSet};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Reports the stored blobs no tag keeps alive.
pub struct OrphanSweeper<'a> {
    blob_store: &'a dyn EnumerableBlobStore,
    cancellation: CancellationToken,
}

impl<'a> OrphanSweeper<'a> {
    pub fn new(blob_store: &'a dyn EnumerableBlobStore, cancellation: CancellationToken) -> Self {
        Self {
            blob_store,
            cancellation,
        }
    }

    /// Must only run once every repository has been marked.
    #[instrument(skip_all)]
    pub async fn sweep(&self, live_set: &LiveSet) -> Result<Vec<Digest>, Error> {
        let mut orphans = Vec::new();
        let mut population = 0usize;
        let mut blobs = self.blob_store.list_blobs();

        while let Some(blob) = blobs.next().await {
            let digest = match blob {
                Ok(digest) => digest,
                Err(blob_store::Error::PathNotFound(path)) => {
                    debug!("No blob found under '{path}'");
                    break;
                }
                Err(e) => return Err(Error::BlobEnumeration(e)),
            };

            if self.cancellation.is_cancelled() {
                return Err(Error::Cancelled(format!(
                    "sweep interrupted after {population} blobs"
                )));
            }

            population += 1;
            if !live_set.contains(&digest) {
                debug!("Orphan blob: {digest}");
                orphans.push(digest);
            }
        }

        info!(
            "Swept {population} blobs, {} live, {} orphans",
            population - orphans.len(),
            orphans.len()
        );
        Ok(orphans)
    }
}
