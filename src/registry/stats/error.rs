use crate::registry::oci::{Digest, Namespace};
use crate::registry::{blob_store, metadata_store, oci};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    RepositoryEnumeration(metadata_store::Error),
    InvalidRepositoryName {
        name: String,
        source: oci::Error,
    },
    TagEnumeration {
        namespace: Namespace,
        source: metadata_store::Error,
    },
    ManifestEnumeration {
        namespace: Namespace,
        source: metadata_store::Error,
    },
    ManifestFetch {
        namespace: Namespace,
        digest: Digest,
        source: metadata_store::Error,
    },
    BlobEnumeration(blob_store::Error),
    Unsupported(String),
    Cancelled(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::RepositoryEnumeration(err) => {
                write!(f, "Failed to enumerate repositories: {err}")
            }
            Error::InvalidRepositoryName { name, source } => {
                write!(f, "Invalid repository name '{name}': {source}")
            }
            Error::TagEnumeration { namespace, source } => {
                write!(f, "Failed to enumerate tags of '{namespace}': {source}")
            }
            Error::ManifestEnumeration { namespace, source } => {
                write!(f, "Failed to enumerate manifests of '{namespace}': {source}")
            }
            Error::ManifestFetch {
                namespace,
                digest,
                source,
            } => write!(f, "Failed to fetch manifest '{namespace}@{digest}': {source}"),
            Error::BlobEnumeration(err) => write!(f, "Failed to enumerate blobs: {err}"),
            Error::Unsupported(msg) => write!(f, "Unsupported: {msg}"),
            Error::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
