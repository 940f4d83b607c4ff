use crate::registry::{data_store, oci};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Configuration(String),
    StorageBackend(String),
    InvalidData(String),
    PathNotFound(String),
    ReferenceNotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Error::StorageBackend(msg) => write!(f, "Storage backend error: {msg}"),
            Error::InvalidData(msg) => write!(f, "Invalid data: {msg}"),
            Error::PathNotFound(path) => write!(f, "Path not found: {path}"),
            Error::ReferenceNotFound => write!(f, "Reference not found"),
        }
    }
}

impl std::error::Error for Error {}

impl From<data_store::Error> for Error {
    fn from(err: data_store::Error) -> Self {
        match err {
            data_store::Error::Configuration(msg) => Error::Configuration(msg),
            data_store::Error::Io(msg) => Error::StorageBackend(msg),
            data_store::Error::NotFound(_) => Error::ReferenceNotFound,
        }
    }
}

impl From<oci::Error> for Error {
    fn from(err: oci::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
