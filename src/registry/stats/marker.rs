use crate::registry::metadata_store::{self, MetadataStore};
use crate::registry::oci::{Digest, Namespace};
use crate::registry::stats::{Error, LiveSet, RepositoryStats};
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// How deep the references of a tagged manifest list are followed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpansionMode {
    /// References of a tagged manifest are marked, without fetching them.
    #[default]
    SingleLevel,
    /// Manifests referenced by a tagged manifest list are fetched as well, and
    /// their own references marked, down to the leaves.
    Recursive,
}

/// Reverse index from manifest digest to the tags resolving to it.
#[derive(Debug, Default)]
pub struct TagIndex {
    tags: Vec<String>,
    by_digest: HashMap<Digest, Vec<String>>,
}

impl TagIndex {
    /// Lists and resolves every tag of the repository.
    ///
    /// A tag whose link is missing is kept in the index but resolves to nothing.
    pub async fn build(
        store: &dyn MetadataStore,
        namespace: &Namespace,
        page_size: u16,
    ) -> Result<Self, Error> {
        let tag_error = |source| Error::TagEnumeration {
            namespace: namespace.clone(),
            source,
        };

        let mut tags = Vec::new();
        let mut marker = None;
        loop {
            let (page, next_marker) = store
                .list_tags(namespace, page_size, marker)
                .await
                .map_err(tag_error)?;
            tags.extend(page);
            if next_marker.is_none() {
                break;
            }
            marker = next_marker;
        }

        let mut by_digest: HashMap<Digest, Vec<String>> = HashMap::new();
        for tag in &tags {
            match store.read_tag(namespace, tag).await {
                Ok(digest) => by_digest.entry(digest).or_default().push(tag.clone()),
                Err(metadata_store::Error::ReferenceNotFound) => {
                    debug!("'{namespace}': tag '{tag}' has no link");
                }
                Err(e) => return Err(tag_error(e)),
            }
        }

        Ok(Self { tags, by_digest })
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn tags_for(&self, digest: &Digest) -> &[String] {
        self.by_digest.get(digest).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Classifies the manifests of a repository and marks what its tags keep alive.
pub struct ReferenceMarker {
    metadata_store: Arc<dyn MetadataStore>,
    page_size: u16,
    expansion: ExpansionMode,
}

impl ReferenceMarker {
    pub fn new(
        metadata_store: Arc<dyn MetadataStore>,
        page_size: u16,
        expansion: ExpansionMode,
    ) -> Self {
        Self {
            metadata_store,
            page_size,
            expansion,
        }
    }

    #[instrument(skip(self, live_set))]
    pub async fn mark_repository(
        &self,
        namespace: &Namespace,
        live_set: &mut LiveSet,
    ) -> Result<RepositoryStats, Error> {
        let store = self.metadata_store.as_ref();
        let index = TagIndex::build(store, namespace, self.page_size).await?;

        let mut stats = RepositoryStats::default();
        for tag in index.tags() {
            stats.tags.insert(tag.clone(), None);
        }

        let Some(revisions) = self.collect_revisions(namespace).await? else {
            return Ok(stats);
        };

        let mut tagged = Vec::new();
        for digest in revisions {
            let tags = index.tags_for(&digest);
            if tags.is_empty() {
                debug!("'{namespace}': {digest} is untagged");
                stats.manifests.insert(digest, true);
                continue;
            }

            for tag in tags {
                stats.tags.insert(tag.clone(), Some(digest.clone()));
            }
            stats.manifests.insert(digest.clone(), false);
            live_set.mark(digest.clone());
            tagged.push(digest);
        }

        for digest in &tagged {
            self.mark_references(namespace, digest, live_set).await?;
        }

        Ok(stats)
    }

    /// Returns `None` when the repository has no manifest index at all.
    async fn collect_revisions(
        &self,
        namespace: &Namespace,
    ) -> Result<Option<Vec<Digest>>, Error> {
        let mut revisions = Vec::new();
        let mut listing = self.metadata_store.list_revisions(namespace);

        while let Some(revision) = listing.next().await {
            match revision {
                Ok(digest) => revisions.push(digest),
                Err(metadata_store::Error::PathNotFound(path)) => {
                    warn!("'{namespace}': no manifest index at '{path}', skipping its manifests");
                    return Ok(None);
                }
                Err(source) => {
                    return Err(Error::ManifestEnumeration {
                        namespace: namespace.clone(),
                        source,
                    })
                }
            }
        }

        Ok(Some(revisions))
    }

    async fn mark_references(
        &self,
        namespace: &Namespace,
        digest: &Digest,
        live_set: &mut LiveSet,
    ) -> Result<(), Error> {
        let manifest = self
            .metadata_store
            .read_manifest(namespace, digest)
            .await
            .map_err(|source| Error::ManifestFetch {
                namespace: namespace.clone(),
                digest: digest.clone(),
                source,
            })?;

        for reference in manifest.references() {
            live_set.mark(reference.digest);
        }

        if self.expansion == ExpansionMode::Recursive && manifest.is_index() {
            let children = manifest.manifests.into_iter().map(|d| d.digest).collect();
            self.expand_children(namespace, digest, children, live_set)
                .await?;
        }

        Ok(())
    }

    async fn expand_children(
        &self,
        namespace: &Namespace,
        root: &Digest,
        children: Vec<Digest>,
        live_set: &mut LiveSet,
    ) -> Result<(), Error> {
        let mut visited = HashSet::from([root.clone()]);
        let mut pending = children;

        while let Some(digest) = pending.pop() {
            if !visited.insert(digest.clone()) {
                continue;
            }

            let manifest = match self.metadata_store.read_manifest(namespace, &digest).await {
                Ok(manifest) => manifest,
                Err(metadata_store::Error::ReferenceNotFound) => {
                    warn!("'{namespace}': manifest {digest} referenced by {root} not found");
                    continue;
                }
                Err(source) => {
                    return Err(Error::ManifestFetch {
                        namespace: namespace.clone(),
                        digest,
                        source,
                    })
                }
            };

            for reference in manifest.references() {
                live_set.mark(reference.digest);
            }
            if manifest.is_index() {
                pending.extend(manifest.manifests.into_iter().map(|d| d.digest));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::metadata_store::MockMetadataStore;
    use crate::registry::oci::Manifest;
    use crate::registry::tests::FSRegistryTestCase;
    use futures_util::stream;
    use std::collections::BTreeMap;

    fn marker(t: &FSRegistryTestCase, expansion: ExpansionMode) -> ReferenceMarker {
        ReferenceMarker::new(Arc::new(t.metadata_store().clone()), 2, expansion)
    }

    #[tokio::test]
    async fn test_tagged_manifest_propagates_liveness() {
        let t = FSRegistryTestCase::new();
        let namespace = Namespace::new("app").unwrap();
        let (digest, blobs) = t.create_image(&namespace, &[b"l1", b"l2"]).await;
        t.tag(&namespace, "latest", &digest).await;
        t.tag(&namespace, "v1", &digest).await;

        let mut live_set = LiveSet::new();
        let stats = marker(&t, ExpansionMode::SingleLevel)
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        assert_eq!(stats.tags["latest"], Some(digest.clone()));
        assert_eq!(stats.tags["v1"], Some(digest.clone()));
        assert!(!stats.manifests[&digest]);
        assert_eq!(stats.untagged().count(), 0);

        assert_eq!(live_set.len(), 1 + blobs.len());
        assert!(live_set.contains(&digest));
        for blob in &blobs {
            assert!(live_set.contains(blob));
        }
    }

    #[tokio::test]
    async fn test_untagged_manifest_is_not_a_root() {
        let t = FSRegistryTestCase::new();
        let namespace = Namespace::new("app").unwrap();
        let (digest, blobs) = t.create_image(&namespace, &[b"lonely"]).await;

        let mut live_set = LiveSet::new();
        let stats = marker(&t, ExpansionMode::SingleLevel)
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        assert!(stats.tags.is_empty());
        assert_eq!(stats.untagged().collect::<Vec<_>>(), [&digest]);
        assert!(live_set.is_empty());
        assert!(!live_set.contains(&blobs[1]));
    }

    #[tokio::test]
    async fn test_tag_without_manifest_is_unresolved() {
        let t = FSRegistryTestCase::new();
        let namespace = Namespace::new("app").unwrap();
        let (digest, _) = t.create_image(&namespace, &[b"layer"]).await;
        t.tag(&namespace, "latest", &digest).await;

        let dangling = FSRegistryTestCase::digest_of(b"never pushed");
        t.tag(&namespace, "dangling", &dangling).await;

        let mut live_set = LiveSet::new();
        let stats = marker(&t, ExpansionMode::SingleLevel)
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        assert_eq!(stats.tags["dangling"], None);
        assert_eq!(stats.tags["latest"], Some(digest));
        assert!(!live_set.contains(&dangling));
    }

    #[tokio::test]
    async fn test_missing_manifest_index_is_tolerated() {
        let t = FSRegistryTestCase::new();
        let namespace = Namespace::new("broken").unwrap();
        let (digest, _) = t.create_image(&namespace, &[b"layer"]).await;
        t.tag(&namespace, "latest", &digest).await;
        t.delete_manifests_dir(&namespace).await;

        let mut live_set = LiveSet::new();
        let stats = marker(&t, ExpansionMode::SingleLevel)
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        assert!(stats.is_empty());
        assert!(live_set.is_empty());
    }

    #[tokio::test]
    async fn test_missing_revisions_keeps_tags_unresolved() {
        let mut store = MockMetadataStore::new();
        store
            .expect_list_tags()
            .returning(|_, _, _| Ok((vec!["a".to_string(), "b".to_string()], None)));
        store
            .expect_read_tag()
            .returning(|_, _| Err(metadata_store::Error::ReferenceNotFound));
        store.expect_list_revisions().returning(|_| {
            stream::iter([Err(metadata_store::Error::PathNotFound(
                "revisions".to_string(),
            ))])
            .boxed()
        });

        let marker = ReferenceMarker::new(Arc::new(store), 10, ExpansionMode::SingleLevel);
        let namespace = Namespace::new("app").unwrap();
        let mut live_set = LiveSet::new();
        let stats = marker
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        let expected: BTreeMap<String, Option<Digest>> =
            [("a".to_string(), None), ("b".to_string(), None)].into();
        assert_eq!(stats.tags, expected);
        assert!(stats.manifests.is_empty());
    }

    #[tokio::test]
    async fn test_revision_enumeration_failure_is_fatal() {
        let mut store = MockMetadataStore::new();
        store.expect_list_tags().returning(|_, _, _| Ok((vec![], None)));
        store.expect_list_revisions().returning(|_| {
            stream::iter([Err(metadata_store::Error::StorageBackend(
                "io".to_string(),
            ))])
            .boxed()
        });

        let marker = ReferenceMarker::new(Arc::new(store), 10, ExpansionMode::SingleLevel);
        let namespace = Namespace::new("app").unwrap();
        let err = marker
            .mark_repository(&namespace, &mut LiveSet::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::ManifestEnumeration {
                namespace,
                source: metadata_store::Error::StorageBackend("io".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_tag_enumeration_failure_is_fatal() {
        let mut store = MockMetadataStore::new();
        store.expect_list_tags().returning(|_, _, _| {
            Err(metadata_store::Error::StorageBackend("io".to_string()))
        });

        let marker = ReferenceMarker::new(Arc::new(store), 10, ExpansionMode::SingleLevel);
        let namespace = Namespace::new("app").unwrap();
        let err = marker
            .mark_repository(&namespace, &mut LiveSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TagEnumeration { .. }));
    }

    #[tokio::test]
    async fn test_tag_read_failure_is_fatal() {
        let mut store = MockMetadataStore::new();
        store
            .expect_list_tags()
            .returning(|_, _, _| Ok((vec!["latest".to_string()], None)));
        store
            .expect_read_tag()
            .returning(|_, _| Err(metadata_store::Error::InvalidData("garbage".to_string())));

        let marker = ReferenceMarker::new(Arc::new(store), 10, ExpansionMode::SingleLevel);
        let namespace = Namespace::new("app").unwrap();
        let err = marker
            .mark_repository(&namespace, &mut LiveSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TagEnumeration { .. }));
    }

    #[tokio::test]
    async fn test_tagged_manifest_fetch_failure_is_fatal() {
        let digest = Digest::Sha256("ef".repeat(32));

        let mut store = MockMetadataStore::new();
        store
            .expect_list_tags()
            .returning(|_, _, _| Ok((vec!["latest".to_string()], None)));
        let target = digest.clone();
        store
            .expect_read_tag()
            .returning(move |_, _| Ok(target.clone()));
        let revision = digest.clone();
        store
            .expect_list_revisions()
            .returning(move |_| stream::iter([Ok(revision.clone())]).boxed());
        store
            .expect_read_manifest()
            .returning(|_, _| Err(metadata_store::Error::ReferenceNotFound));

        let marker = ReferenceMarker::new(Arc::new(store), 10, ExpansionMode::SingleLevel);
        let namespace = Namespace::new("app").unwrap();
        let err = marker
            .mark_repository(&namespace, &mut LiveSet::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::ManifestFetch {
                namespace,
                digest,
                source: metadata_store::Error::ReferenceNotFound,
            }
        );
    }

    #[tokio::test]
    async fn test_untagged_manifest_is_never_fetched() {
        let digest = Digest::Sha256("12".repeat(32));

        let mut store = MockMetadataStore::new();
        store.expect_list_tags().returning(|_, _, _| Ok((vec![], None)));
        store
            .expect_list_revisions()
            .returning(move |_| stream::iter([Ok(digest.clone())]).boxed());
        store
            .expect_read_manifest()
            .never()
            .returning(|_, _| Ok(Manifest::default()));

        let marker = ReferenceMarker::new(Arc::new(store), 10, ExpansionMode::SingleLevel);
        let namespace = Namespace::new("app").unwrap();
        let stats = marker
            .mark_repository(&namespace, &mut LiveSet::new())
            .await
            .unwrap();

        assert_eq!(stats.untagged().count(), 1);
    }

    #[tokio::test]
    async fn test_manifest_list_expansion() {
        let t = FSRegistryTestCase::new();
        let namespace = Namespace::new("multiarch").unwrap();
        let (amd64, amd64_blobs) = t.create_image(&namespace, &[b"amd64"]).await;
        let (arm64, arm64_blobs) = t.create_image(&namespace, &[b"arm64", b"extra"]).await;
        let index = t.create_index(&namespace, &[amd64.clone(), arm64.clone()]).await;
        let nested = t.create_index(&namespace, &[index.clone()]).await;
        t.tag(&namespace, "latest", &nested).await;

        let mut live_set = LiveSet::new();
        marker(&t, ExpansionMode::SingleLevel)
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        assert!(live_set.contains(&nested));
        assert!(live_set.contains(&index));
        assert!(!live_set.contains(&amd64));
        assert_eq!(live_set.len(), 2);

        let mut live_set = LiveSet::new();
        let stats = marker(&t, ExpansionMode::Recursive)
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        for digest in [&nested, &index, &amd64, &arm64] {
            assert!(live_set.contains(digest));
        }
        for blob in amd64_blobs.iter().chain(&arm64_blobs) {
            assert!(live_set.contains(blob));
        }
        // children stay untagged in the report, only liveness is propagated
        assert_eq!(stats.untagged().count(), 3);
    }

    #[tokio::test]
    async fn test_recursive_expansion_skips_missing_children() {
        let t = FSRegistryTestCase::new();
        let namespace = Namespace::new("multiarch").unwrap();
        let (child, blobs) = t.create_image(&namespace, &[b"amd64"]).await;
        let missing = FSRegistryTestCase::digest_of(b"not pushed");
        let index = t.create_index(&namespace, &[missing.clone(), child.clone()]).await;
        t.tag(&namespace, "latest", &index).await;

        let mut live_set = LiveSet::new();
        marker(&t, ExpansionMode::Recursive)
            .mark_repository(&namespace, &mut live_set)
            .await
            .unwrap();

        assert!(live_set.contains(&missing));
        assert!(live_set.contains(&child));
        for blob in &blobs {
            assert!(live_set.contains(blob));
        }
    }
}
