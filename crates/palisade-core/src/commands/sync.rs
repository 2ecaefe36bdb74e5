use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::BlobBackend;

pub const DEFAULT_SYNC_WORKERS: usize = 10;

/// Upper bound on queued uploads so the walker cannot race far ahead of
/// slow network workers.
const TASK_QUEUE_DEPTH: usize = 100;

#[derive(Debug, Default)]
pub struct SyncStats {
    pub scanned: u64,
    pub uploaded: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Push every local object to `dest`, skipping keys the destination
/// already holds. Content-addressed keys make re-uploads harmless, so
/// per-object failures are logged and the sweep continues.
pub fn run(local_repo: &Path, dest: &Arc<dyn BlobBackend>, workers: usize) -> Result<SyncStats> {
    let objects_dir = local_repo.join("objects");
    let workers = workers.max(1);

    let uploaded = AtomicU64::new(0);
    let skipped = AtomicU64::new(0);
    let failed = AtomicU64::new(0);
    let mut scanned: u64 = 0;

    let (task_tx, task_rx) = crossbeam_channel::bounded::<(String, std::path::PathBuf)>(TASK_QUEUE_DEPTH);

    std::thread::scope(|s| -> Result<()> {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let dest = Arc::clone(dest);
            let uploaded = &uploaded;
            let skipped = &skipped;
            let failed = &failed;

            s.spawn(move || {
                for (key, path) in task_rx {
                    match dest.has(&key) {
                        Ok(true) => {
                            skipped.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(key = %key, error = %e, "destination check failed");
                            failed.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    }

                    let data = match std::fs::read(&path) {
                        Ok(d) => d,
                        Err(e) => {
                            warn!(key = %key, error = %e, "local object unreadable");
                            failed.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };

                    match dest.put(&key, &data) {
                        Ok(()) => {
                            uploaded.fetch_add(1, Ordering::Relaxed);
                            debug!(key = %key, "object synced");
                        }
                        Err(e) => {
                            warn!(key = %key, error = %e, "upload failed");
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }

        // Walk objects/<shard>/<rest>, reconstructing keys from the layout.
        for shard in std::fs::read_dir(&objects_dir)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let shard_name = shard.file_name().to_string_lossy().into_owned();

            for object in std::fs::read_dir(shard.path())? {
                let object = object?;
                if !object.file_type()?.is_file() {
                    continue;
                }
                let object_name = object.file_name().to_string_lossy().into_owned();
                if object_name.starts_with('.') {
                    continue;
                }

                let key = format!("{shard_name}{object_name}");
                scanned += 1;
                task_tx
                    .send((key, object.path()))
                    .expect("sync workers outlive the walker");
            }
        }

        drop(task_tx);
        Ok(())
    })?;

    let stats = SyncStats {
        scanned,
        uploaded: uploaded.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    };
    info!(
        scanned = stats.scanned,
        uploaded = stats.uploaded,
        skipped = stats.skipped,
        failed = stats.failed,
        "sync finished"
    );
    Ok(stats)
}
