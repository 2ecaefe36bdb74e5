//! Tamper-evident action log: newline-delimited JSON entries where each
//! entry commits to its predecessor by hash, so a silent rewrite anywhere
//! in the file breaks the chain.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PalisadeError, Result};

pub const LOG_FILE_NAME: &str = "security.log";

/// `prev_hash` of the first entry.
const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub action: String,
    pub user: String,
    pub details: String,
    pub prev_hash: String,
    pub hash: String,
}

/// Append-only audit log handle for one repository.
///
/// The internal mutex serializes appends within this process; the hash
/// chain depends on that total order. Multiple processes appending to the
/// same file is misuse and not defended against. After the first append or
/// verification the chain tip is cached, so appends stop re-reading the
/// whole file.
pub struct AuditLog {
    path: PathBuf,
    last_hash: Mutex<Option<String>>,
}

impl AuditLog {
    pub fn open(repo_dir: &Path) -> Self {
        AuditLog {
            path: repo_dir.join(LOG_FILE_NAME),
            last_hash: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry recording `action` with free-form `details`.
    pub fn log_action(&self, action: &str, details: &str) -> Result<()> {
        let mut cached = self.last_hash.lock().unwrap();

        let prev_hash = match cached.as_ref() {
            Some(hash) => hash.clone(),
            None => self.read_last_hash()?,
        };

        let entry = AuditEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            action: action.to_string(),
            user: std::env::var("USER").unwrap_or_default(),
            details: details.to_string(),
            prev_hash,
            hash: String::new(),
        };
        let hash = entry_hash(&entry);

        let entry = AuditEntry { hash: hash.clone(), ..entry };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        self.append_line(&line)?;

        *cached = Some(hash);
        Ok(())
    }

    /// Walk the whole file, recomputing every entry hash and checking each
    /// link. Returns the number of verified entries; the first bad line is
    /// fatal and identified by its 1-based number. An absent file is an
    /// empty, valid chain.
    pub fn verify(&self) -> Result<usize> {
        let _guard = self.last_hash.lock().unwrap();

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut prev_hash = GENESIS_HASH.to_string();
        let mut checked = 0;

        for (idx, line) in contents.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry =
                serde_json::from_str(line).map_err(|e| PalisadeError::ChainBroken {
                    line: line_no,
                    reason: format!("malformed entry: {e}"),
                })?;

            if entry.prev_hash != prev_hash {
                return Err(PalisadeError::ChainBroken {
                    line: line_no,
                    reason: "prev_hash mismatch".into(),
                });
            }
            if entry.hash != entry_hash(&entry) {
                return Err(PalisadeError::ChainBroken {
                    line: line_no,
                    reason: "hash mismatch".into(),
                });
            }

            prev_hash = entry.hash;
            checked += 1;
        }

        Ok(checked)
    }

    /// Chain tip from disk: the last entry's hash, or the genesis hash for
    /// an absent or empty file.
    fn read_last_hash(&self) -> Result<String> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(GENESIS_HASH.to_string())
            }
            Err(e) => return Err(e.into()),
        };

        let mut last = GENESIS_HASH.to_string();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(line).map_err(|e| {
                PalisadeError::Other(format!("audit log unreadable, refusing to append: {e}"))
            })?;
            last = entry.hash;
        }
        Ok(last)
    }

    fn append_line(&self, line: &[u8]) -> Result<()> {
        let mut options = std::fs::OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(line)?;
        Ok(())
    }
}

/// SHA-256 over the textual fields, concatenated without separators.
fn entry_hash(entry: &AuditEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.timestamp.as_bytes());
    hasher.update(entry.action.as_bytes());
    hasher.update(entry.user.as_bytes());
    hasher.update(entry.details.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_is_valid_empty_chain() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path());
        assert_eq!(log.verify().unwrap(), 0);
    }

    #[test]
    fn appended_entries_chain_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path());

        log.log_action("BACKUP_START", "job home").unwrap();
        log.log_action("BACKUP_DONE", "snapshot 1").unwrap();
        log.log_action("RESTORE_START", "snapshot 1").unwrap();

        assert_eq!(log.verify().unwrap(), 3);
    }

    #[test]
    fn first_entry_uses_genesis_prev_hash() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path());
        log.log_action("INIT", "repo created").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let entry: AuditEntry = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(entry.prev_hash, GENESIS_HASH);
    }

    #[test]
    fn fresh_handle_continues_existing_chain() {
        let dir = tempfile::tempdir().unwrap();
        AuditLog::open(dir.path())
            .log_action("FIRST", "a")
            .unwrap();

        // A second handle must pick up the tip from disk, not restart it.
        let log = AuditLog::open(dir.path());
        log.log_action("SECOND", "b").unwrap();
        assert_eq!(log.verify().unwrap(), 2);
    }

    #[test]
    fn tampered_details_break_chain_at_that_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path());
        log.log_action("A", "one").unwrap();
        log.log_action("B", "two").unwrap();
        log.log_action("C", "three").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let mut lines: Vec<String> = contents.lines().map(String::from).collect();
        let mut middle: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        middle["details"] = serde_json::Value::String("doctored".into());
        lines[1] = serde_json::to_string(&middle).unwrap();
        std::fs::write(log.path(), lines.join("\n") + "\n").unwrap();

        let err = AuditLog::open(dir.path()).verify().unwrap_err();
        match err {
            PalisadeError::ChainBroken { line, .. } => assert_eq!(line, 2),
            other => panic!("expected ChainBroken, got {other}"),
        }
    }

    #[test]
    fn deleted_entry_breaks_chain() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path());
        log.log_action("A", "one").unwrap();
        log.log_action("B", "two").unwrap();
        log.log_action("C", "three").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        std::fs::write(log.path(), format!("{}\n{}\n", lines[0], lines[2])).unwrap();

        let err = AuditLog::open(dir.path()).verify().unwrap_err();
        assert!(matches!(err, PalisadeError::ChainBroken { line: 2, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn log_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path());
        log.log_action("A", "one").unwrap();

        let mode = std::fs::metadata(log.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
