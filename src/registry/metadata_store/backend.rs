use crate::registry::data_store::{self, DataStore};
use crate::registry::metadata_store::link::LinkMetadata;
use crate::registry::metadata_store::{Error, MetadataStore};
use crate::registry::oci::{Digest, Manifest, Namespace};
use crate::registry::pagination::paginate_sorted;
use crate::registry::path_builder;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Entry of a repository directory holding its tags and manifest revisions.
const MANIFESTS_DIR: &str = "_manifests";

/// Metadata store over the distribution storage layout.
#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn DataStore>,
}

impl Debug for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStoreBackend").finish()
    }
}

impl Backend {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn read_link(&self, path: &str) -> Result<Digest, Error> {
        let content = self.store.read(path).await?;
        Ok(LinkMetadata::from_bytes(&content)?.target)
    }
}

/// Depth-first walk of the repositories directory, listing each directory once.
struct NamespaceWalk {
    store: Arc<dyn DataStore>,
    base_path: String,
    pending: Vec<String>,
}

impl NamespaceWalk {
    fn new(store: Arc<dyn DataStore>, base_path: &str) -> Self {
        Self {
            store,
            base_path: base_path.to_string(),
            pending: vec![base_path.to_string()],
        }
    }

    async fn next_namespace(&mut self) -> Result<Option<String>, Error> {
        while let Some(current_path) = self.pending.pop() {
            let entries = match self.store.list_dir(&current_path).await {
                Ok(entries) => entries,
                Err(data_store::Error::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };

            // "_manifests" marks a repository, other "_" entries hold its
            // uploads and layer links. Anything else may be a nested repository.
            let mut is_repository = false;
            for entry in entries.iter().rev() {
                if entry == MANIFESTS_DIR {
                    is_repository = true;
                } else if !entry.starts_with('_') {
                    self.pending.push(format!("{current_path}/{entry}"));
                }
            }

            if !is_repository {
                continue;
            }

            if let Some(repo_name) = current_path
                .strip_prefix(self.base_path.as_str())
                .map(|name| name.trim_start_matches('/'))
                .filter(|name| !name.is_empty())
            {
                debug!("Found repository: {repo_name}");
                return Ok(Some(repo_name.to_string()));
            }
        }

        Ok(None)
    }
}

fn parse_revision(entry: String) -> Option<Digest> {
    match Digest::try_from(format!("sha256:{entry}").as_str()) {
        Ok(digest) => Some(digest),
        Err(_) => {
            warn!("Ignoring unexpected manifest revision entry: '{entry}'");
            None
        }
    }
}

#[async_trait]
impl MetadataStore for Backend {
    fn list_namespaces(&self) -> BoxStream<'static, Result<String, Error>> {
        let walk = NamespaceWalk::new(self.store.clone(), path_builder::repository_dir());

        stream::try_unfold(walk, |mut walk| async move {
            let namespace = walk.next_namespace().await?;
            Ok::<_, Error>(namespace.map(|namespace| (namespace, walk)))
        })
        .boxed()
    }

    #[instrument(skip(self))]
    async fn list_tags(
        &self,
        namespace: &Namespace,
        n: u16,
        last: Option<String>,
    ) -> Result<(Vec<String>, Option<String>), Error> {
        let path = path_builder::manifest_tags_dir(namespace);
        debug!("Listing tags in path: {path}");

        let tags = match self.store.list_dir(&path).await {
            Ok(tags) => tags,
            Err(data_store::Error::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(paginate_sorted(&tags, n, last.as_deref()))
    }

    #[instrument(skip(self))]
    async fn read_tag(&self, namespace: &Namespace, tag: &str) -> Result<Digest, Error> {
        let path = path_builder::manifest_tag_link_path(namespace, tag);
        self.read_link(&path).await
    }

    fn list_revisions(&self, namespace: &Namespace) -> BoxStream<'static, Result<Digest, Error>> {
        let store = self.store.clone();
        let path = path_builder::manifest_revisions_link_root_dir(namespace, "sha256");
        debug!("Listing revisions in path: {path}");

        stream::once(async move {
            let listing = store.list_dir(&path).await;
            match listing {
                Ok(revisions) => Ok(revisions),
                Err(data_store::Error::NotFound(_)) => Err(Error::PathNotFound(path)),
                Err(e) => Err(e.into()),
            }
        })
        .map_ok(|revisions| {
            stream::iter(
                revisions
                    .into_iter()
                    .filter_map(parse_revision)
                    .map(Ok::<Digest, Error>),
            )
        })
        .try_flatten()
        .boxed()
    }

    #[instrument(skip(self))]
    async fn read_manifest(
        &self,
        namespace: &Namespace,
        digest: &Digest,
    ) -> Result<Manifest, Error> {
        let link_path = path_builder::manifest_revision_link_path(namespace, digest);
        let target = self.read_link(&link_path).await?;
        if &target != digest {
            return Err(Error::InvalidData(format!(
                "Revision link of {digest} points to {target}"
            )));
        }

        let content = self.store.read(&path_builder::blob_path(digest)).await?;
        Ok(Manifest::from_slice(&content)?)
    }
}
