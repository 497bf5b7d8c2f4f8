//! services/api/src/adapters/storage.rs
//!
//! Filesystem implementation of the `ObjectStorage` port. Objects live under a root
//! directory and are served back publicly through `GET /files/{*key}`.

use async_trait::async_trait;
use bytes::Bytes;
use muneccim_core::ports::{ObjectStorage, PortError, PortResult, StoredObject};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error};

#[derive(Clone)]
pub struct FsStorageAdapter {
    root: PathBuf,
    public_base_url: String,
}

impl FsStorageAdapter {
    /// `public_base_url` is the externally reachable address of this service.
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_base_url, key)
    }

    /// Maps a key to a path under the root. Keys that could escape the root are refused.
    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(PortError::NotFound(format!("Object {} not found", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for FsStorageAdapter {
    async fn put_object(&self, key: &str, data: Bytes) -> PortResult<StoredObject> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create storage directory {:?}: {}", parent, e);
                PortError::Unexpected(e.to_string())
            })?;
        }
        tokio::fs::write(&path, &data).await.map_err(|e| {
            error!("Failed to write object {}: {}", key, e);
            PortError::Unexpected(e.to_string())
        })?;
        debug!("Stored {} bytes at {}", data.len(), key);

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
        })
    }

    async fn get_object(&self, key: &str) -> PortResult<Bytes> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PortError::NotFound(format!("Object {} not found", key)))
            }
            Err(e) => {
                error!("Failed to read object {}: {}", key, e);
                Err(PortError::Unexpected(e.to_string()))
            }
        }
    }

    async fn delete_object(&self, key: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PortError::NotFound(format!("Object {} not found", key)))
            }
            Err(e) => {
                error!("Failed to delete object {}: {}", key, e);
                Err(PortError::Unexpected(e.to_string()))
            }
        }
    }
}
