//! Read-only mark and sweep over the registry storage.
//!
//! Every tag of every repository is resolved and the manifests it designates
//! are marked live with their references. Once all repositories are marked,
//! the blob population is swept and any blob left unmarked is reported as an
//! orphan. Nothing is ever written to the storage.

mod error;
mod live_set;
mod marker;
mod render;
mod report;
mod sweeper;

use crate::registry::blob_store::BlobStoreHandle;
use crate::registry::metadata_store::MetadataStore;
use crate::registry::oci::Namespace;
use chrono::Utc;
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

pub use error::Error;
pub use live_set::LiveSet;
pub use marker::{ExpansionMode, ReferenceMarker};
pub use render::ReportRenderer;
pub use report::{RepositoryStats, StatsReport};
pub use sweeper::OrphanSweeper;

pub struct StatsCollector {
    metadata_store: Arc<dyn MetadataStore>,
    blob_store: BlobStoreHandle,
    page_size: u16,
    expansion: ExpansionMode,
    cancellation: CancellationToken,
}

impl StatsCollector {
    pub fn new(
        metadata_store: Arc<dyn MetadataStore>,
        blob_store: BlobStoreHandle,
        page_size: u16,
        expansion: ExpansionMode,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            metadata_store,
            blob_store,
            page_size,
            expansion,
            cancellation,
        }
    }

    /// Runs the whole analysis. Either every repository and blob is accounted
    /// for, or a single error is returned.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> Result<StatsReport, Error> {
        let Some(enumerator) = self.blob_store.enumerator() else {
            return Err(Error::Unsupported(
                "the blob store cannot enumerate its content".to_string(),
            ));
        };

        let mut live_set = LiveSet::new();
        let repositories = self.mark(&mut live_set).await?;
        info!(
            "Marked {} repositories, {} live digests",
            repositories.len(),
            live_set.len()
        );

        let sweeper = OrphanSweeper::new(enumerator, self.cancellation.clone());
        let orphan_blobs = sweeper.sweep(&live_set).await?;

        Ok(StatsReport {
            repositories,
            orphan_blobs,
            generated_at: Utc::now(),
        })
    }

    async fn mark(
        &self,
        live_set: &mut LiveSet,
    ) -> Result<BTreeMap<Namespace, RepositoryStats>, Error> {
        let marker = ReferenceMarker::new(
            self.metadata_store.clone(),
            self.page_size,
            self.expansion,
        );

        let mut repositories = BTreeMap::new();
        let mut names = self.metadata_store.list_namespaces();

        while let Some(name) = names.next().await {
            let name = name.map_err(Error::RepositoryEnumeration)?;
            if self.cancellation.is_cancelled() {
                return Err(Error::Cancelled(format!(
                    "marking interrupted after {} repositories",
                    repositories.len()
                )));
            }

            let namespace = Namespace::new(&name)
                .map_err(|source| Error::InvalidRepositoryName { name, source })?;

            debug!("Marking repository '{namespace}'");
            let stats = marker.mark_repository(&namespace, live_set).await?;
            repositories.insert(namespace, stats);
        }

        Ok(repositories)
    }
}
