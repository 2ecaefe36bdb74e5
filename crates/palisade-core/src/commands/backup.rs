use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::auditlog::AuditLog;
use crate::chunker::FixedChunker;
use crate::crypto::MasterKey;
use crate::error::Result;
use crate::index::Index;
use crate::platform::fs as platform_fs;
use crate::risk::{self, RiskLevel};
use crate::storage::object_store::ObjectStore;
use crate::storage::BlobBackend;

#[derive(Debug, Default)]
pub struct BackupStats {
    pub snapshot_id: i64,
    pub files: u64,
    pub skipped: u64,
    pub bytes: u64,
}

/// Back up `source` (a file or a directory tree) into a new snapshot.
///
/// The index always lives in the local repository directory; chunk data
/// goes wherever `backend` points. Unreadable files are logged and skipped
/// without failing the snapshot; store and index errors are fatal.
pub fn run(
    repo_dir: &Path,
    backend: Arc<dyn BlobBackend>,
    key: &MasterKey,
    source: &Path,
    audit_log: &AuditLog,
    cancel: &AtomicBool,
) -> Result<BackupStats> {
    let source_abs = std::path::absolute(source)?;
    platform_fs::create_dir_private(repo_dir)?;
    audit_log.log_action(
        "BACKUP_START",
        &format!("backing up {}", source_abs.display()),
    )?;

    let index = Index::open(repo_dir, key.clone())?;
    let store = ObjectStore::new(backend, key.clone());

    let snapshot_id = index.create_snapshot(&format!("Backup of {}", source_abs.display()))?;
    let mut stats = BackupStats {
        snapshot_id,
        ..BackupStats::default()
    };

    let meta = std::fs::metadata(&source_abs)?;
    if meta.is_file() {
        process_file(&source_abs, snapshot_id, &index, &store, &mut stats)?;
    } else {
        let walker = ignore::WalkBuilder::new(&source_abs)
            .standard_filters(false)
            .follow_links(false)
            .build();

        for entry in walker {
            if cancel.load(Ordering::SeqCst) {
                info!(snapshot_id, "backup cancelled, snapshot left partial");
                break;
            }
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    stats.skipped += 1;
                    continue;
                }
            };
            if entry.file_type().is_some_and(|t| t.is_file()) {
                process_file(entry.path(), snapshot_id, &index, &store, &mut stats)?;
            }
        }
    }

    info!(
        snapshot_id,
        files = stats.files,
        skipped = stats.skipped,
        bytes = stats.bytes,
        "backup finished"
    );
    Ok(stats)
}

fn process_file(
    path: &Path,
    snapshot_id: i64,
    index: &Index,
    store: &ObjectStore,
    stats: &mut BackupStats,
) -> Result<()> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            stats.skipped += 1;
            return Ok(());
        }
    };

    let meta = file.metadata()?;
    let summary = platform_fs::summarize_metadata(&meta);
    let mod_time = datetime_from_nanos(summary.mtime_ns);

    let file_id = index.add_file(
        snapshot_id,
        &path.to_string_lossy(),
        summary.size as i64,
        summary.mode,
        mod_time,
    )?;

    let assessment = risk::analyze_file(path);
    match assessment.level {
        RiskLevel::Critical | RiskLevel::High => {
            info!(path = %path.display(), level = %assessment.level, "sensitive file detected");
        }
        _ => {}
    }

    let mut chunker = FixedChunker::with_default_size(file);
    let mut offset: i64 = 0;

    loop {
        let chunk = match chunker.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                // Mid-file read failure: keep what we have, move on.
                warn!(path = %path.display(), error = %e, "read error, file left partial");
                break;
            }
        };

        let len = chunk.data.len() as i64;
        store.put(&chunk.data)?;
        index.add_chunk(file_id, &chunk.hash, offset, len)?;
        offset += len;
        stats.bytes += len as u64;
    }

    stats.files += 1;
    debug!(path = %path.display(), bytes = offset, "file processed");
    Ok(())
}

fn datetime_from_nanos(nanos: i64) -> DateTime<Utc> {
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, subsec).unwrap_or_default()
}
