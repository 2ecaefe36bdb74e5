pub mod local_backend;
pub mod object_store;
pub mod s3_backend;

use std::path::Path;
use std::sync::Arc;

use crate::config::{StorageConfig, StorageKind};
use crate::error::Result;

/// Abstract key-value storage for encrypted blob objects.
///
/// Keys are bare 64-char hex content hashes; each backend decides its own
/// physical layout (both built-in backends shard as `objects/<kk>/<rest>`).
/// Backends know nothing about encryption, compression, or hashing.
pub trait BlobBackend: Send + Sync {
    /// Write an object. Writing a key that already exists must succeed
    /// without corrupting the stored bytes.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read an object by key. Returns `None` if not found; other failures
    /// are real errors.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Check if an object exists. "Absent" is `Ok(false)`; transport or
    /// permission failures propagate as errors.
    fn has(&self, key: &str) -> Result<bool>;

    /// Release any resources held by the backend.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the configured backend: S3 when a storage block selects it,
/// otherwise the local filesystem rooted at the repository directory.
pub fn backend_from_config(
    storage: Option<&StorageConfig>,
    repo_dir: &Path,
) -> Result<Arc<dyn BlobBackend>> {
    match storage {
        Some(cfg) if cfg.kind == StorageKind::S3 => {
            Ok(Arc::new(s3_backend::S3Backend::from_config(cfg)?))
        }
        _ => Ok(Arc::new(local_backend::LocalBackend::new(repo_dir)?)),
    }
}
