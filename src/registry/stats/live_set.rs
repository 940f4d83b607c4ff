use crate::registry::oci::Digest;
use std::collections::HashSet;

/// Digests reachable from at least one tag, across all repositories.
///
/// The set only grows: marking an already live digest is a no-op.
#[derive(Debug, Default)]
pub struct LiveSet {
    digests: HashSet<Digest>,
}

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the digest was not live yet.
    pub fn mark(&mut self, digest: Digest) -> bool {
        self.digests.insert(digest)
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.digests.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}
