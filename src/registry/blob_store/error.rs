use crate::registry::data_store;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Configuration(String),
    StorageBackend(String),
    PathNotFound(String),
    BlobNotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "Configuration error: {e}"),
            Error::StorageBackend(e) => write!(f, "Storage backend error: {e}"),
            Error::PathNotFound(path) => write!(f, "Path not found: {path}"),
            Error::BlobNotFound => write!(f, "Blob not found"),
        }
    }
}

impl std::error::Error for Error {}

impl From<data_store::Error> for Error {
    fn from(err: data_store::Error) -> Self {
        match err {
            data_store::Error::Configuration(e) => Error::Configuration(e),
            data_store::Error::Io(e) => Error::StorageBackend(e),
            data_store::Error::NotFound(path) => Error::PathNotFound(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::StorageBackend("disk failure".to_string()).to_string(),
            "Storage backend error: disk failure"
        );
        assert_eq!(
            Error::PathNotFound("v2/blobs/sha256".to_string()).to_string(),
            "Path not found: v2/blobs/sha256"
        );
        assert_eq!(Error::BlobNotFound.to_string(), "Blob not found");
    }

    #[test]
    fn test_from_data_store_error() {
        assert_eq!(
            Error::from(data_store::Error::NotFound("a/b".to_string())),
            Error::PathNotFound("a/b".to_string())
        );
        assert_eq!(
            Error::from(data_store::Error::Io("broken".to_string())),
            Error::StorageBackend("broken".to_string())
        );
    }
}
