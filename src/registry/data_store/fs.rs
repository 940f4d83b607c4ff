use crate::registry::data_store::{DataStore, Error};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub root_dir: String,
}

#[derive(Clone, Debug)]
pub struct Backend {
    root: PathBuf,
}

impl Backend {
    pub fn new(config: &BackendConfig) -> Self {
        info!("Using filesystem data-store backend at '{}'", config.root_dir);
        Self {
            root: PathBuf::from(&config.root_dir),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    #[cfg(test)]
    pub async fn write(&self, path: &str, data: &[u8]) -> Result<(), std::io::Error> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(full_path, data).await
    }

    #[cfg(test)]
    pub async fn delete_dir(&self, path: &str) -> Result<(), std::io::Error> {
        let full_path = self.full_path(path);
        match fs::remove_dir_all(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DataStore for Backend {
    #[instrument(skip(self))]
    async fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        Ok(fs::read(self.full_path(path)).await?)
    }

    #[instrument(skip(self))]
    async fn list_dir(&self, path: &str) -> Result<Vec<String>, Error> {
        let full_path = self.full_path(path);
        let mut entries = Vec::new();

        let mut read_dir = match fs::read_dir(full_path).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = read_dir.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }

        entries.sort();
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn file_size(&self, path: &str) -> Result<u64, Error> {
        let metadata = fs::metadata(self.full_path(path)).await?;
        Ok(metadata.len())
    }
}
