use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::error::Result;
use crate::hash::ContentHash;
use crate::index::Index;
use crate::storage::object_store::ObjectStore;

/// Outcome of a full repository audit.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub total_files: u64,
    pub total_chunks: u64,
    pub missing_chunks: u64,
    pub corrupt_chunks: u64,
    pub healthy: bool,
    pub score: u8,
}

/// Verify every chunk referenced by any snapshot.
///
/// Each unique hash is read back through the store exactly once, which
/// exercises decryption, decompression, and hash verification — a presence
/// check alone would miss bit rot. Per-chunk failures are recorded and the
/// sweep continues so the report is complete.
pub fn run(index: &Index, store: &ObjectStore, cancel: &AtomicBool) -> Result<AuditReport> {
    let mut report = AuditReport {
        healthy: true,
        score: 100,
        ..AuditReport::default()
    };
    let mut checked: HashSet<String> = HashSet::new();

    'sweep: for snapshot in index.list_snapshots()? {
        let files = index.get_files(snapshot.id)?;
        report.total_files += files.len() as u64;

        for file in &files {
            for chunk in index.get_chunks(file.id)? {
                if cancel.load(Ordering::SeqCst) {
                    info!("audit cancelled, report covers chunks checked so far");
                    break 'sweep;
                }
                if !checked.insert(chunk.hash.clone()) {
                    continue;
                }
                report.total_chunks += 1;

                let hash = match ContentHash::from_hex(&chunk.hash) {
                    Ok(h) => h,
                    Err(_) => {
                        report.corrupt_chunks += 1;
                        warn!(hash = %chunk.hash, file = %file.path, "unparseable chunk hash");
                        continue;
                    }
                };

                if let Err(e) = store.get(&hash) {
                    let exists = store.has(&hash).unwrap_or(false);
                    if exists {
                        report.corrupt_chunks += 1;
                        warn!(hash = %hash, file = %file.path, error = %e, "corrupt chunk");
                    } else {
                        report.missing_chunks += 1;
                        warn!(hash = %hash, file = %file.path, "missing chunk");
                    }
                }
            }
        }
    }

    if report.missing_chunks > 0 || report.corrupt_chunks > 0 {
        report.healthy = false;
        report.score = 0;
    }

    info!(
        files = report.total_files,
        chunks = report.total_chunks,
        missing = report.missing_chunks,
        corrupt = report.corrupt_chunks,
        healthy = report.healthy,
        "audit finished"
    );
    Ok(report)
}
