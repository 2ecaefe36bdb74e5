use thiserror::Error;

use crate::hash::ContentHash;

pub type Result<T> = std::result::Result<T, PalisadeError>;

#[derive(Debug, Error)]
pub enum PalisadeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid passphrase or corrupted key file")]
    InvalidPassphrase,

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("decryption failed (wrong key or data corruption)")]
    DecryptionFailed,

    #[error("integrity check failed for chunk {0}")]
    Integrity(ContentHash),

    #[error("missing object: {0}")]
    MissingObject(ContentHash),

    #[error("metadata corruption ({0})")]
    MetadataCorruption(String),

    #[error("audit log chain broken at line {line}: {reason}")]
    ChainBroken { line: usize, reason: String },

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
