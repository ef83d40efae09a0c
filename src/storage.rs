use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const UPLOADS_MOUNT: &str = "/uploads";

/// Opaque byte storage for uploaded recordings.
#[rocket::async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the bytes under a freshly generated key ending in `extension` and returns the key.
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String, AppError>;

    /// Removes a blob. `Ok(false)` means there was nothing to remove.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    fn url_for(&self, key: &str) -> String;
}

pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Generates a storage key unrelated to the client's file name.
pub fn new_blob_key(extension: &str) -> String {
    format!("{}{}", Uuid::new_v4().simple(), extension)
}

/// Keys are generated server side, but anything that could escape the root is refused.
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains(['/', '\\'])
        && !key.contains("..")
}

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url_prefix: UPLOADS_MOUNT.to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        if !is_safe_key(key) {
            return Err(AppError::Storage(format!("Refusing blob key {:?}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[rocket::async_trait]
impl BlobStore for LocalBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let key = new_blob_key(extension);
        let path = self.path_for(&key)?;

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        info!(key = %key, "Stored blob");
        Ok(key)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let path = self.path_for(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed blob");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Blob already absent");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.url_prefix, key)
    }
}
