//! On-disk key file: the master key wrapped by a passphrase-derived key.

use std::path::Path;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{PalisadeError, Result};
use crate::platform::fs as platform_fs;

use super::{derive_wrapping_key, MasterKey, KEY_SIZE, SALT_SIZE};

const ALGORITHM: &str = "argon2id_aes256gcm";

/// Serialized form stored at the user-chosen key file path.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    #[serde(with = "base64_bytes")]
    salt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    encrypted_key: Vec<u8>,
    algo: String,
}

/// Encrypt `master` under `passphrase` and write it to `path` with
/// owner-only permissions.
pub fn save(path: &Path, master: &MasterKey, passphrase: &str) -> Result<()> {
    let mut salt = vec![0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let wrapping = derive_wrapping_key(passphrase, &salt)?;
    let kek = MasterKey::from_bytes(*wrapping);
    let encrypted_key = kek.encrypt(master.as_bytes())?;

    let file = KeyFile {
        salt,
        encrypted_key,
        algo: ALGORITHM.to_string(),
    };
    let data = serde_json::to_vec(&file)?;
    platform_fs::write_private(path, &data)?;
    Ok(())
}

/// Load and unwrap the master key from `path`.
///
/// Any authentication failure surfaces as the single opaque
/// [`PalisadeError::InvalidPassphrase`]; callers cannot tell a wrong
/// passphrase from a corrupted key file.
pub fn load(path: &Path, passphrase: &str) -> Result<MasterKey> {
    let data = std::fs::read(path)?;
    let file: KeyFile = serde_json::from_slice(&data)
        .map_err(|e| PalisadeError::Config(format!("malformed key file: {e}")))?;

    if file.algo != ALGORITHM {
        return Err(PalisadeError::Config(format!(
            "unsupported key file algorithm '{}'",
            file.algo
        )));
    }

    let wrapping = derive_wrapping_key(passphrase, &file.salt)?;
    let kek = MasterKey::from_bytes(*wrapping);
    let key_bytes = kek
        .decrypt(&file.encrypted_key)
        .map_err(|_| PalisadeError::InvalidPassphrase)?;

    let key_bytes: [u8; KEY_SIZE] = key_bytes
        .try_into()
        .map_err(|_| PalisadeError::InvalidPassphrase)?;
    Ok(MasterKey::from_bytes(key_bytes))
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Base64.decode(s).map_err(serde::de::Error::custom)
    }
}
