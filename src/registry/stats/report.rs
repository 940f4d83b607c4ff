use crate::registry::oci::{Digest, Namespace};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// What the marking phase learned about one repository.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RepositoryStats {
    /// Every enumerated tag, with the manifest it resolves to. `None` when
    /// the tag does not resolve to any manifest of the repository.
    pub tags: BTreeMap<String, Option<Digest>>,
    /// Every enumerated manifest, flagged `true` when no tag resolves to it.
    pub manifests: BTreeMap<Digest, bool>,
}

impl RepositoryStats {
    pub fn untagged(&self) -> impl Iterator<Item = &Digest> {
        self.manifests
            .iter()
            .filter(|(_, untagged)| **untagged)
            .map(|(digest, _)| digest)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.manifests.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsReport {
    pub repositories: BTreeMap<Namespace, RepositoryStats>,
    pub orphan_blobs: Vec<Digest>,
    pub generated_at: DateTime<Utc>,
}
