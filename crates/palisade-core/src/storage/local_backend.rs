use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PalisadeError, Result};
use crate::platform::fs as platform_fs;
use crate::storage::BlobBackend;

/// Filesystem-backed blob store rooted at the repository directory.
///
/// Objects live at `objects/<first-two-hex-chars>/<remaining-62>`, so each
/// shard directory stays small enough for plain `readdir` tooling.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: &Path) -> Result<Self> {
        platform_fs::create_dir_private(&root.join("objects"))?;
        Ok(LocalBackend {
            root: root.to_path_buf(),
        })
    }

    /// Reject keys that are not bare lowercase-hex object names.
    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(PalisadeError::Other("unsafe storage key: empty".into()));
        }
        if !key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PalisadeError::Other(format!(
                "unsafe storage key: non-hex '{key}'"
            )));
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        if key.len() < 2 {
            return Ok(self.root.join("objects").join(key));
        }
        Ok(self.root.join("objects").join(&key[..2]).join(&key[2..]))
    }
}

impl BlobBackend for LocalBackend {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;

        // Content-addressed objects never change: an existing file means
        // the bytes are already durable.
        if path.exists() {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            platform_fs::create_dir_private(parent)?;
        }

        // Write to a temp name and rename into place, so a crash mid-write
        // cannot leave a truncated object that passes the existence check.
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        platform_fs::write_private(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn has(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        "ab".to_string() + &"cd".repeat(31)
    }

    #[test]
    fn validate_key_rejects_unsafe_keys() {
        assert!(LocalBackend::validate_key("").is_err());
        assert!(LocalBackend::validate_key("../../etc/passwd").is_err());
        assert!(LocalBackend::validate_key("/absolute").is_err());
        assert!(LocalBackend::validate_key("has/slash").is_err());
    }

    #[test]
    fn validate_key_accepts_hex() {
        assert!(LocalBackend::validate_key(&test_key()).is_ok());
    }

    #[test]
    fn put_get_roundtrip_with_shard_layout() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        let key = test_key();

        backend.put(&key, b"payload").unwrap();
        assert_eq!(backend.get(&key).unwrap().unwrap(), b"payload");

        let sharded = dir.path().join("objects").join(&key[..2]).join(&key[2..]);
        assert!(sharded.is_file());
    }

    #[test]
    fn put_is_idempotent_and_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        let key = test_key();

        backend.put(&key, b"original").unwrap();
        backend.put(&key, b"would-be-overwrite").unwrap();
        assert_eq!(backend.get(&key).unwrap().unwrap(), b"original");
    }

    #[test]
    fn get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        assert!(backend.get(&test_key()).unwrap().is_none());
    }

    #[test]
    fn has_reflects_presence() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        let key = test_key();

        assert!(!backend.has(&key).unwrap());
        backend.put(&key, b"x").unwrap();
        assert!(backend.has(&key).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn objects_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        let key = test_key();
        backend.put(&key, b"x").unwrap();

        let shard = dir.path().join("objects").join(&key[..2]);
        assert_eq!(
            std::fs::metadata(&shard).unwrap().permissions().mode() & 0o777,
            0o700
        );
        assert_eq!(
            std::fs::metadata(shard.join(&key[2..]))
                .unwrap()
                .permissions()
                .mode()
                & 0o777,
            0o600
        );
    }
}
