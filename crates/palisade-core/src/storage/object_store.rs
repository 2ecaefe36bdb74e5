use std::sync::Arc;

use crate::compress;
use crate::crypto::MasterKey;
use crate::error::{PalisadeError, Result};
use crate::hash::ContentHash;
use crate::storage::BlobBackend;

/// Content-addressed store of opaque plaintext blobs keyed by their BLAKE3
/// hash. Layered as `plaintext -> zstd -> AES-256-GCM -> backend`; reads
/// reverse the layers and re-verify the hash.
pub struct ObjectStore {
    backend: Arc<dyn BlobBackend>,
    key: MasterKey,
}

impl ObjectStore {
    pub fn new(backend: Arc<dyn BlobBackend>, key: MasterKey) -> Self {
        ObjectStore { backend, key }
    }

    /// Store a plaintext blob, returning its content hash.
    ///
    /// If the backend already holds the hash, nothing is written: the
    /// envelope on disk stays byte-stable, which keeps dedupe accounting
    /// and audits meaningful. (Re-encrypting would produce a different
    /// nonce and a spuriously "new" object.)
    pub fn put(&self, plaintext: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::of(plaintext);
        let key = hash.to_hex();

        if self.backend.has(&key)? {
            return Ok(hash);
        }

        let compressed = compress::compress(plaintext)?;
        let envelope = self.key.encrypt(&compressed)?;
        self.backend.put(&key, &envelope)?;
        Ok(hash)
    }

    /// Fetch, decrypt, decompress, and hash-verify a blob.
    pub fn get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        let envelope = self
            .backend
            .get(&hash.to_hex())?
            .ok_or(PalisadeError::MissingObject(*hash))?;

        let compressed = self.key.decrypt(&envelope).map_err(|e| match e {
            PalisadeError::DecryptionFailed | PalisadeError::CiphertextTooShort => {
                PalisadeError::DecryptionFailed
            }
            other => other,
        })?;
        let plaintext = compress::decompress(&compressed)?;

        if ContentHash::of(&plaintext) != *hash {
            return Err(PalisadeError::Integrity(*hash));
        }
        Ok(plaintext)
    }

    pub fn has(&self, hash: &ContentHash) -> Result<bool> {
        self.backend.has(&hash.to_hex())
    }

    /// Full read-back verification, not a mere presence check.
    pub fn verify(&self, hash: &ContentHash) -> Result<()> {
        self.get(hash).map(|_| ())
    }
}
