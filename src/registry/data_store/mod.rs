mod error;
pub mod fs;
pub mod s3;

use async_trait::async_trait;

pub use error::Error;

/// Read primitives of the storage driver holding the registry layout.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>, Error>;

    /// Lists the direct children of `path`. A missing directory is reported
    /// as `Error::NotFound`.
    async fn list_dir(&self, path: &str) -> Result<Vec<String>, Error>;

    async fn file_size(&self, path: &str) -> Result<u64, Error>;
}
