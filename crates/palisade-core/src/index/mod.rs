use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::crypto::MasterKey;
use crate::error::{PalisadeError, Result};
use crate::hash::ContentHash;

/// Relational metadata store: snapshots, files, chunk references.
///
/// The `files.path` column holds the hex-encoded AES-GCM envelope of the
/// original absolute path, so a reader of the database alone learns nothing
/// about the filesystem layout. Chunk hashes stay in the clear; they are
/// derived from content the blob side already addresses by the same value.
pub struct Index {
    conn: Connection,
    key: MasterKey,
}

#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub size: i64,
    pub mode: u32,
    pub mod_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub hash: String,
    pub offset: i64,
    pub size: i64,
}

impl Index {
    /// Open (creating if needed) the index database at `<repo>/index.db`.
    /// The master key is held for the lifetime of this handle to encrypt
    /// and decrypt path fields.
    pub fn open(repo_dir: &Path, key: MasterKey) -> Result<Self> {
        let conn = Connection::open(repo_dir.join("index.db"))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL,
                mode INTEGER NOT NULL,
                mod_time TEXT NOT NULL,
                FOREIGN KEY(snapshot_id) REFERENCES snapshots(id)
            );
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                hash TEXT NOT NULL,
                offset INTEGER NOT NULL,
                size INTEGER NOT NULL,
                FOREIGN KEY(file_id) REFERENCES files(id)
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_hash ON chunks(hash);
            "#,
        )?;
        Ok(Index { conn, key })
    }

    pub fn create_snapshot(&self, description: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO snapshots (timestamp, description) VALUES (?1, ?2)",
            params![Utc::now(), description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_file(
        &self,
        snapshot_id: i64,
        path: &str,
        size: i64,
        mode: u32,
        mod_time: DateTime<Utc>,
    ) -> Result<i64> {
        let envelope = self.key.encrypt(path.as_bytes())?;
        let encoded = hex::encode(envelope);

        self.conn.execute(
            "INSERT INTO files (snapshot_id, path, size, mode, mod_time) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![snapshot_id, encoded, size, mode, mod_time],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_chunk(&self, file_id: i64, hash: &ContentHash, offset: i64, size: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO chunks (file_id, hash, offset, size) VALUES (?1, ?2, ?3, ?4)",
            params![file_id, hash.to_hex(), offset, size],
        )?;
        Ok(())
    }

    /// All snapshots, newest first.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, timestamp, description FROM snapshots ORDER BY id DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok(SnapshotRecord {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Files of a snapshot in insertion order, paths decrypted.
    pub fn get_files(&self, snapshot_id: i64) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, size, mode, mod_time FROM files WHERE snapshot_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([snapshot_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, DateTime<Utc>>(4)?,
            ))
        })?;

        let mut files = Vec::new();
        for row in rows {
            let (id, encoded, size, mode, mod_time) = row?;
            let path = self.decrypt_path(&encoded)?;
            files.push(FileRecord {
                id,
                path,
                size,
                mode,
                mod_time,
            });
        }
        Ok(files)
    }

    /// Chunk references of a file, offset ascending.
    pub fn get_chunks(&self, file_id: i64) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT hash, offset, size FROM chunks WHERE file_id = ?1 ORDER BY offset ASC",
        )?;
        let rows = stmt.query_map([file_id], |row| {
            Ok(ChunkRecord {
                hash: row.get(0)?,
                offset: row.get(1)?,
                size: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn decrypt_path(&self, encoded: &str) -> Result<String> {
        let envelope = hex::decode(encoded)
            .map_err(|_| PalisadeError::MetadataCorruption("path hex decode".into()))?;
        let plaintext = self
            .key
            .decrypt(&envelope)
            .map_err(|_| PalisadeError::MetadataCorruption("path decrypt".into()))?;
        String::from_utf8(plaintext)
            .map_err(|_| PalisadeError::MetadataCorruption("path utf-8".into()))
    }
}
