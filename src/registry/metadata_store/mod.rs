mod backend;
mod config;
mod error;
mod link;

use crate::registry::oci::{Digest, Manifest, Namespace};
use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub use backend::Backend;
pub use config::MetadataStoreConfig;
pub use error::Error;

/// Repository, tag and manifest enumeration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Single pass over every repository name, nested ones included.
    fn list_namespaces(&self) -> BoxStream<'static, Result<String, Error>>;

    /// A repository without any tag yields an empty list.
    async fn list_tags(
        &self,
        namespace: &Namespace,
        n: u16,
        last: Option<String>,
    ) -> Result<(Vec<String>, Option<String>), Error>;

    async fn read_tag(&self, namespace: &Namespace, tag: &str) -> Result<Digest, Error>;

    /// Yields `Error::PathNotFound` when the repository has no manifest
    /// revision index at all.
    fn list_revisions(&self, namespace: &Namespace) -> BoxStream<'static, Result<Digest, Error>>;

    async fn read_manifest(
        &self,
        namespace: &Namespace,
        digest: &Digest,
    ) -> Result<Manifest, Error>;
}
