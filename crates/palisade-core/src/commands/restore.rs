use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use globset::{Glob, GlobMatcher};
use tracing::{debug, info};

use crate::error::{PalisadeError, Result};
use crate::hash::ContentHash;
use crate::index::{FileRecord, Index};
use crate::platform::fs as platform_fs;
use crate::storage::object_store::ObjectStore;

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub force: bool,
    pub dry_run: bool,
    /// Filename globs restored first; earlier patterns win.
    pub priority_patterns: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RestoreStats {
    pub files: u64,
    pub bytes: u64,
}

/// Restore every file of a snapshot under `target_dir`.
///
/// Files are visited in priority order. Any store error aborts the whole
/// restore; a dry run performs no writes but still pulls every chunk
/// through the store, which exercises decryption and hash verification.
pub fn run(
    index: &Index,
    store: &ObjectStore,
    snapshot_id: i64,
    target_dir: &Path,
    opts: &RestoreOptions,
    cancel: &AtomicBool,
) -> Result<RestoreStats> {
    let matchers = compile_patterns(&opts.priority_patterns)?;

    let mut files = index.get_files(snapshot_id)?;
    files.sort_by(|a, b| {
        let pa = priority_score(&a.path, &matchers);
        let pb = priority_score(&b.path, &matchers);
        pa.cmp(&pb).then_with(|| a.path.cmp(&b.path))
    });

    info!(
        snapshot_id,
        files = files.len(),
        target = %target_dir.display(),
        dry_run = opts.dry_run,
        "restoring snapshot"
    );

    let mut stats = RestoreStats::default();
    for file in &files {
        if cancel.load(Ordering::SeqCst) {
            info!("restore cancelled");
            break;
        }

        let dest = target_dir.join(strip_root(&file.path));
        if dest.exists() && !opts.force {
            return Err(PalisadeError::Other(format!(
                "file already exists: {} (use force to overwrite)",
                dest.display()
            )));
        }

        let written = restore_file(index, store, file, &dest, opts.dry_run, cancel)?;
        stats.files += 1;
        stats.bytes += written;
        debug!(path = %dest.display(), bytes = written, "file restored");
    }

    Ok(stats)
}

fn restore_file(
    index: &Index,
    store: &ObjectStore,
    file: &FileRecord,
    dest: &Path,
    dry_run: bool,
    cancel: &AtomicBool,
) -> Result<u64> {
    let chunks = index.get_chunks(file.id)?;

    let mut out = if dry_run {
        None
    } else {
        if let Some(parent) = dest.parent() {
            platform_fs::create_dir_private(parent)?;
        }
        Some(std::fs::File::create(dest)?)
    };

    let mut written: u64 = 0;
    for chunk in &chunks {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        let hash = ContentHash::from_hex(&chunk.hash)?;
        let data = store.get(&hash)?;
        if let Some(ref mut out) = out {
            out.write_all(&data)?;
        }
        written += data.len() as u64;
    }

    if let Some(out) = out {
        drop(out);
        platform_fs::apply_mode(dest, file.mode)?;
        let secs = file.mod_time.timestamp();
        let nanos = file.mod_time.timestamp_subsec_nanos();
        let _ = platform_fs::set_file_mtime(dest, secs, nanos);
    }

    Ok(written)
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<GlobMatcher>> {
    patterns
        .iter()
        .map(|p| {
            Glob::new(p)
                .map(|g| g.compile_matcher())
                .map_err(|e| PalisadeError::Config(format!("invalid priority pattern '{p}': {e}")))
        })
        .collect()
}

/// Index of the first pattern matching the file's basename; no match sorts
/// after every match.
fn priority_score(path: &str, matchers: &[GlobMatcher]) -> usize {
    let basename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    matchers
        .iter()
        .position(|m| m.is_match(&basename))
        .unwrap_or(matchers.len())
}

/// Make a recorded absolute path joinable under the target directory by
/// dropping its root (and, on Windows, its drive prefix).
fn strip_root(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matchers(patterns: &[&str]) -> Vec<GlobMatcher> {
        compile_patterns(&patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn priority_prefers_earlier_patterns() {
        let m = matchers(&["*.key", "*.conf"]);
        assert_eq!(priority_score("/etc/server.key", &m), 0);
        assert_eq!(priority_score("/etc/nginx.conf", &m), 1);
        assert_eq!(priority_score("/var/log/app.log", &m), 2);
    }

    #[test]
    fn priority_matches_basename_not_full_path() {
        let m = matchers(&["*.key"]);
        // The directory name must not trigger the pattern.
        assert_eq!(priority_score("/home/keys.key.d/readme.txt", &m), 1);
    }

    #[test]
    fn no_patterns_means_uniform_priority() {
        let m = matchers(&[]);
        assert_eq!(priority_score("/a", &m), 0);
        assert_eq!(priority_score("/b", &m), 0);
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let patterns = vec!["[".to_string()];
        assert!(matches!(
            compile_patterns(&patterns),
            Err(PalisadeError::Config(_))
        ));
    }

    #[test]
    fn strip_root_drops_leading_separator() {
        assert_eq!(strip_root("/etc/hosts"), PathBuf::from("etc/hosts"));
        assert_eq!(strip_root("relative/file"), PathBuf::from("relative/file"));
    }
}
